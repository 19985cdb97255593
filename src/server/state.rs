use crate::cache::CacheStore;
use crate::config::GatewayConfig;
use crate::metrics::Metrics;
use crate::routing::RouteTable;
use crate::swr::SwrEngine;
use anyhow::Result;
use std::sync::Arc;

/// Shared gateway state, cheaply cloneable.
///
/// Routes are compiled once at startup and never hot-reloaded — there is
/// no control plane here. The cache store and SWR engine are the only
/// pieces of mutable shared state.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<GatewayConfig>,
    pub metrics: Metrics,
    pub routes: Arc<RouteTable>,
    pub cache: Arc<CacheStore>,
    pub swr: Arc<SwrEngine>,
}

impl GatewayState {
    pub fn new(config: GatewayConfig, routes: RouteTable, cache_max_bytes: u64) -> Result<Self> {
        let metrics = Metrics::install();
        let cache = Arc::new(CacheStore::new(cache_max_bytes));
        let swr = Arc::new(SwrEngine::new(cache.clone()));
        let routes = Arc::new(routes);

        metrics::gauge!("cachegate_routes_total").set(routes.len() as f64);
        metrics::gauge!("cachegate_cache_bytes_max").set(cache_max_bytes as f64);

        Ok(Self {
            config: Arc::new(config),
            metrics,
            routes,
            cache,
            swr,
        })
    }

    pub fn refresh_cache_gauges(&self) {
        metrics::gauge!("cachegate_cache_bytes_used").set(self.cache.used_bytes() as f64);
        metrics::gauge!("cachegate_cache_entries").set(self.cache.len() as f64);
    }
}
