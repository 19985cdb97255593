use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Histogram bucket boundaries for latency metrics (seconds).
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Histogram bucket boundaries for response body size (bytes).
const SIZE_BUCKETS: &[f64] = &[
    100.0, 500.0, 1000.0, 5000.0, 10000.0, 50000.0, 100000.0, 500000.0, 1000000.0,
];

/// Thin handle around the global metrics recorder.
///
/// After `Metrics::install()` the `metrics` crate macros (`counter!`, `gauge!`,
/// `histogram!`) can be used anywhere in the codebase. The `PrometheusHandle`
/// is retained solely for rendering the `/metrics` endpoint.
#[derive(Clone)]
pub struct Metrics {
    handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and register metric descriptions.
    ///
    /// Must be called **once** at startup before any `counter!` / `gauge!` /
    /// `histogram!` calls.
    pub fn install() -> Self {
        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(
                metrics_exporter_prometheus::Matcher::Suffix("_duration_seconds".to_string()),
                LATENCY_BUCKETS,
            )
            .expect("valid matcher")
            .set_buckets_for_metric(
                metrics_exporter_prometheus::Matcher::Full("cachegate_http_response_size_bytes".to_string()),
                SIZE_BUCKETS,
            )
            .expect("valid matcher")
            .install_recorder()
            .expect("failed to install metrics recorder");

        // --- Describe all metrics (adds HELP / TYPE lines) ---

        describe_counter!(
            "cachegate_http_requests_total",
            Unit::Count,
            "Total HTTP requests processed"
        );
        describe_histogram!(
            "cachegate_http_request_duration_seconds",
            Unit::Seconds,
            "Total request duration from client perspective"
        );
        describe_gauge!(
            "cachegate_http_requests_in_flight",
            Unit::Count,
            "Number of requests currently being processed"
        );
        describe_histogram!(
            "cachegate_http_response_size_bytes",
            Unit::Bytes,
            "Response body size in bytes"
        );

        // cache store
        describe_counter!(
            "cachegate_cache_hits_total",
            Unit::Count,
            "Total cache hits"
        );
        describe_counter!(
            "cachegate_cache_misses_total",
            Unit::Count,
            "Total cache misses"
        );
        describe_gauge!(
            "cachegate_cache_bytes_used",
            Unit::Bytes,
            "Current cache size in bytes"
        );
        describe_gauge!(
            "cachegate_cache_bytes_max",
            Unit::Bytes,
            "Configured cache byte budget"
        );
        describe_gauge!(
            "cachegate_cache_entries",
            Unit::Count,
            "Number of entries currently in the cache"
        );

        // stale-while-revalidate
        describe_counter!(
            "cachegate_revalidation_success_total",
            Unit::Count,
            "Total successful background revalidations"
        );
        describe_counter!(
            "cachegate_revalidation_failure_total",
            Unit::Count,
            "Total background revalidations that failed and evicted their entry"
        );
        describe_gauge!(
            "cachegate_revalidation_in_flight",
            Unit::Count,
            "Number of background revalidations currently running"
        );

        // upstream
        describe_histogram!(
            "cachegate_upstream_request_duration_seconds",
            Unit::Seconds,
            "Upstream request duration (time spent waiting for the proxied origin)"
        );
        describe_counter!(
            "cachegate_upstream_errors_total",
            Unit::Count,
            "Total non-2xx or connect/read failures from upstream origins"
        );

        // persistence
        describe_counter!(
            "cachegate_persist_dumps_total",
            Unit::Count,
            "Total cache sidecar dumps written"
        );

        // connections
        describe_gauge!(
            "cachegate_connections_active",
            Unit::Count,
            "Number of active downstream connections"
        );
        describe_counter!(
            "cachegate_connections_total",
            Unit::Count,
            "Total connections accepted"
        );

        // routing
        describe_gauge!(
            "cachegate_routes_total",
            Unit::Count,
            "Number of routes currently compiled"
        );

        Self { handle }
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
