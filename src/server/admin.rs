use super::GatewayState;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response};

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

/// Admin surface — metrics scrape + readiness, separate listen address
/// from the data plane so scraping never competes with proxy traffic.
pub fn handle_admin(
    req: Request<Incoming>,
    state: GatewayState,
) -> Result<Response<BoxBody>, hyper::Error> {
    match req.uri().path() {
        "/health" | "/healthz" => Ok(Response::builder()
            .status(200)
            .body(full_body(r#"{"status":"ok"}"#))
            .unwrap()),

        "/ready" | "/readyz" => {
            state.refresh_cache_gauges();
            Ok(Response::builder()
                .status(200)
                .header("content-type", "application/json")
                .body(full_body(format!(
                    r#"{{"status":"ready","routes":{},"cache_entries":{}}}"#,
                    state.routes.len(),
                    state.cache.len(),
                )))
                .unwrap())
        }

        "/metrics" => {
            let body = state.metrics.render();
            Ok(Response::builder()
                .status(200)
                .header("content-type", "text/plain; version=0.0.4; charset=utf-8")
                .body(full_body(body))
                .unwrap())
        }

        _ => Ok(Response::builder()
            .status(404)
            .body(full_body(r#"{"error":"not found"}"#))
            .unwrap()),
    }
}
