use crate::cache::persist;
use crate::codec;
use crate::config::GatewayConfig;
use crate::memory;
use crate::routing::RouteTable;
use crate::server::{self, GatewayState};
use crate::upstream::{ProxyTarget, UpstreamClient};
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Gateway lifecycle: init → configure → compile routes → serve → shutdown.
///
/// There is no control plane to connect to first — routes are compiled
/// once from Rust code and the cache is the only thing warmed from disk.
pub async fn run() -> Result<()> {
    init_tracing();

    let config = GatewayConfig::from_env()?;

    let cache_max_bytes = match config.cache_max_bytes {
        Some(bytes) => bytes,
        None => memory::default_cache_bytes()?,
    };

    if codec::probe_brotli() {
        tracing::info!("codec: brotli available");
    } else {
        tracing::warn!("codec: brotli unavailable, falling back to gzip/deflate");
    }

    let routes = build_routes();

    let state = GatewayState::new(config, routes, cache_max_bytes)?;

    warm_start(&state).await;

    let shutdown = Arc::new(Notify::new());
    start_persistence_loop(&state, &shutdown);
    start_admin_server(&state, &shutdown);

    let listen = state.config.listen;
    tracing::info!("server: starting gateway, listen={}", listen);

    let proxy_handle = tokio::spawn({
        let state = state.clone();
        let shutdown = shutdown.clone();
        async move { server::run_proxy_server(listen, state, shutdown).await }
    });

    wait_for_shutdown(&shutdown).await;

    if let Err(e) = proxy_handle.await {
        tracing::error!("server: proxy task error: {}", e);
    }

    dump_cache(&state).await;

    tracing::info!("server: shutdown complete");
    Ok(())
}

/// Hard-coded route table. A real deployment would draw this from a
/// config file or service catalog; here it is compiled in-process the way
/// a minimal gateway binary with no control plane has to be. The router
/// only understands `:name`/`:name?` segments — there is no wildcard
/// segment, so each proxied path is declared explicitly rather than
/// caught by a single catch-all.
fn build_routes() -> RouteTable {
    let client = UpstreamClient::new();
    let origin_host =
        std::env::var("CACHEGATE_ORIGIN_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let origin_port: u16 = std::env::var("CACHEGATE_ORIGIN_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8081);

    let collection = ProxyTarget::new("http", origin_host.clone(), origin_port, "/api/:resource");
    let item = ProxyTarget::new("http", origin_host, origin_port, "/api/:resource/:id");

    RouteTable::compile(vec![
        crate::proxy::proxy_route("/api/:resource", collection, true, client.clone()),
        crate::proxy::proxy_route("/api/:resource/:id", item, true, client),
    ])
}

async fn warm_start(state: &GatewayState) {
    let path = &state.config.persist_path;
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let entries = persist::load(&bytes);
            let count = entries.len();
            state.cache.load(entries);
            state.refresh_cache_gauges();
            tracing::info!(path = %path.display(), entries = count, "cache: warm-started from sidecar");
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "cache: no sidecar file, starting cold");
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cache: sidecar read failed, starting cold");
        }
    }
}

async fn dump_cache(state: &GatewayState) {
    let path = &state.config.persist_path;
    let entries = state.cache.dump();
    let bytes = persist::dump(&entries);
    match tokio::fs::write(path, &bytes).await {
        Ok(()) => {
            metrics::counter!("cachegate_persist_dumps_total").increment(1);
            tracing::info!(path = %path.display(), entries = entries.len(), "cache: dumped to sidecar");
        }
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "cache: sidecar write failed"),
    }
}

fn start_persistence_loop(state: &GatewayState, shutdown: &Arc<Notify>) {
    let state = state.clone();
    let shutdown = shutdown.clone();
    let interval = std::time::Duration::from_secs(state.config.persist_interval_secs);
    let dumping = Arc::new(AtomicBool::new(false));

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.notified() => return,
            }

            if dumping.swap(true, Ordering::SeqCst) {
                continue; // a dump is already running, skip this tick
            }
            state.refresh_cache_gauges();
            dump_cache(&state).await;
            dumping.store(false, Ordering::SeqCst);
        }
    });
}

fn start_admin_server(state: &GatewayState, shutdown: &Arc<Notify>) {
    let state = state.clone();
    let admin_addr = state.config.admin_listen;
    let shutdown = shutdown.clone();
    tokio::spawn(async move {
        tokio::select! {
            result = server::run_admin_server(admin_addr, state) => {
                if let Err(e) = result {
                    tracing::error!("server: admin failed, error={}", e);
                }
            }
            _ = shutdown.notified() => {}
        }
    });
}

fn init_tracing() {
    let (non_blocking, _guard) = tracing_appender::non_blocking::NonBlockingBuilder::default()
        .buffered_lines_limit(128_000)
        .lossy(true)
        .finish(std::io::stdout());

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false)
                .json(),
        )
        .init();

    std::mem::forget(_guard);
}

async fn wait_for_shutdown(shutdown: &Arc<Notify>) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("server: received SIGINT, shutting down"),
        _ = terminate => tracing::info!("server: received SIGTERM, shutting down"),
    }

    shutdown.notify_waiters();
}
