use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Env-driven gateway configuration. Routes and cache targets are
/// compiled once in Rust code at startup (`server::bootstrap::build_routes`)
/// — there is no dynamic control plane. Only operational knobs live here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Data-plane listen address. From `PORT` (default 3000) and `HOST` /
    /// `HOSTNAME` (default `localhost`).
    pub listen: SocketAddr,

    /// Admin surface (`/metrics`, `/readyz`). `CACHEGATE_ADMIN_LISTEN`,
    /// default `127.0.0.1:9091`.
    pub admin_listen: SocketAddr,

    /// Cache byte budget override. `CACHEGATE_CACHE_MAX_BYTES`; when
    /// absent, defaults to 70% of free system memory at startup (see
    /// `crate::memory::default_cache_bytes`).
    pub cache_max_bytes: Option<u64>,

    /// Sidecar dump file path. `CACHEGATE_PERSIST_PATH`, default
    /// `<tmpdir>/cache.bin`.
    pub persist_path: PathBuf,

    /// Persistence loop interval. `CACHEGATE_PERSIST_INTERVAL_SECS`,
    /// default 5.
    pub persist_interval_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            listen: "127.0.0.1:3000".parse().unwrap(),
            admin_listen: "127.0.0.1:9091".parse().unwrap(),
            cache_max_bytes: None,
            persist_path: std::env::temp_dir().join("cache.bin"),
            persist_interval_secs: 5,
        }
    }
}
