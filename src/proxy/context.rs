use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use std::net::IpAddr;
use std::time::Instant;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

/// Per-request context that flows through the pipeline's phases — what a
/// cache gateway needs per request, rather than a load-balancing proxy's
/// fuller bookkeeping.
pub struct RequestContext {
    pub method: String,
    pub uri_path: String,
    pub route_name: String,
    pub client_ip: Option<IpAddr>,
    pub start: Instant,
}

impl RequestContext {
    pub fn new(method: String, uri_path: String, client_ip: Option<IpAddr>) -> Self {
        Self {
            method,
            uri_path,
            route_name: String::new(),
            client_ip,
            start: Instant::now(),
        }
    }

    /// Build a JSON error response and record metrics in one place — the
    /// single exit point for every error path. `error`/`stack` are both
    /// `Display`-chain text, there being no language stack trace to carry
    /// in Rust; `response_text`, when present, is the captured upstream
    /// body that caused a `RouteError`.
    pub fn error_response(&self, status: StatusCode, msg: &str, code: &str) -> hyper::Response<BoxBody> {
        self.error_response_with_text(status, msg, code, None)
    }

    pub fn error_response_with_text(
        &self,
        status: StatusCode,
        msg: &str,
        code: &str,
        response_text: Option<&str>,
    ) -> hyper::Response<BoxBody> {
        self.record_metrics(status.as_u16(), "ERROR");

        let body = serde_json::json!({
            "error": msg,
            "stack": msg,
            "code": code,
            "responseText": response_text,
        });

        hyper::Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .header("x-cache", "ERROR")
            .body(full_body(serde_json::to_vec(&body).unwrap_or_default()))
            .unwrap()
    }

    pub fn record_metrics(&self, resp_status: u16, cache_status: &str) {
        let mut buf = itoa::Buffer::new();
        let status_str = buf.format(resp_status);

        metrics::counter!(
            "cachegate_http_requests_total",
            "route" => self.route_name.clone(),
            "method" => self.method.clone(),
            "status_code" => status_str.to_owned(),
            "cache" => cache_status.to_string(),
        )
        .increment(1);

        metrics::histogram!(
            "cachegate_http_request_duration_seconds",
            "route" => self.route_name.clone(),
        )
        .record(self.start.elapsed().as_secs_f64());
    }
}
