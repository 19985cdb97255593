//! Request pipeline: route → cache lookup → handler/proxy → encode →
//! respond.
//!
//! Plugged in as the `service_fn` passed to
//! `hyper_util::server::conn::auto::Builder`, the same shape as the
//! teacher's `server::run_proxy_server` connection loop.

use crate::codec::Encoding;
use crate::cors::CorsConfig;
use crate::hash;
use crate::memo::RequestMemo;
use crate::proxy::{full_body, BoxBody, RequestContext};
use crate::routing::{HandlerRequest, RouteTable};
use crate::swr::SwrEngine;
use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use std::net::IpAddr;
use std::sync::Arc;

pub struct Pipeline {
    routes: Arc<RouteTable>,
    swr: Arc<SwrEngine>,
    cors: CorsConfig,
}

impl Pipeline {
    pub fn new(routes: Arc<RouteTable>, swr: Arc<SwrEngine>, cors: CorsConfig) -> Self {
        Pipeline { routes, swr, cors }
    }

    pub async fn handle(
        &self,
        req: Request<hyper::body::Incoming>,
        client_ip: Option<IpAddr>,
    ) -> Response<BoxBody> {
        let method = req.method().as_str().to_string();
        let path = req.uri().path().to_string();
        let query = req.uri().query().unwrap_or("").to_string();
        let ctx = RequestContext::new(method.clone(), path.clone(), client_ip);

        if path == "/favicon.ico" {
            return self.respond_not_found(&ctx);
        }
        if path == "/healthcheck" {
            return self.respond_healthcheck(&ctx);
        }
        if CorsConfig::is_preflight(&method, req.headers()) {
            return self.respond_preflight(&ctx);
        }

        match self.run(req, &ctx, &method, &path, &query).await {
            Ok(resp) => resp,
            Err(err) => {
                tracing::warn!(error = %err, path = %path, "unhandled pipeline error");
                ctx.error_response_with_text(
                    StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                    &err.to_string(),
                    err.code(),
                    err.response_text(),
                )
            }
        }
    }

    async fn run(
        &self,
        req: Request<hyper::body::Incoming>,
        ctx: &RequestContext,
        method: &str,
        path: &str,
        query: &str,
    ) -> Result<Response<BoxBody>, crate::error::GatewayError> {
        let Some((route, params)) = self.routes.match_route(path) else {
            return Ok(self.respond_not_found(ctx));
        };

        let (parts, body) = req.into_parts();
        let body_bytes = body.collect().await.map(|c| c.to_bytes()).unwrap_or_default();

        let memo = RequestMemo::new();
        let salt = parts
            .headers
            .get("x-unique-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let cache_key = memo
            .cache_key_or_init(|| hash::request_key(method, path, query, &salt))
            .await;

        let acceptable = parse_accept_encoding(parts.headers.get("accept-encoding").and_then(|v| v.to_str().ok()));

        let handler_request = HandlerRequest {
            method: method.to_string(),
            uri_path: path.to_string(),
            query: query.to_string(),
            headers: parts.headers,
            body: body_bytes,
            params,
            client_ip: ctx.client_ip,
        };

        let (entry, status) = self
            .swr
            .handle(cache_key, route.cacheable, method, &acceptable, handler_request, route.handler.clone())
            .await?;

        if entry.body.is_empty() {
            return Ok(self.respond_not_found(ctx));
        }

        let mut out_headers = entry.headers.clone();
        self.cors.apply(&mut out_headers);

        let mut builder = Response::builder()
            .status(entry.status)
            .header("x-cache", status.as_str());
        for (k, v) in &out_headers {
            if k.eq_ignore_ascii_case("x-cache") {
                continue;
            }
            builder = builder.header(k, v);
        }

        ctx.record_metrics(entry.status, status.as_str());
        metrics::counter!(
            if status == crate::swr::CacheStatus::Hit { "cachegate_cache_hits_total" } else { "cachegate_cache_misses_total" }
        )
        .increment(1);

        Ok(builder.body(full_body(entry.body)).unwrap())
    }

    fn respond_not_found(&self, ctx: &RequestContext) -> Response<BoxBody> {
        ctx.error_response(StatusCode::NOT_FOUND, "Page not found!", "NOT_FOUND")
    }

    fn respond_healthcheck(&self, ctx: &RequestContext) -> Response<BoxBody> {
        ctx.record_metrics(200, "MISS");
        Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "application/json")
            .header("x-cache", "MISS")
            .body(full_body(Bytes::from_static(
                br#"{"success":true,"message":"Health Check is good."}"#,
            )))
            .unwrap()
    }

    fn respond_preflight(&self, ctx: &RequestContext) -> Response<BoxBody> {
        ctx.record_metrics(204, "MISS");
        let mut builder = Response::builder().status(StatusCode::NO_CONTENT);
        for (k, v) in self.cors.preflight_headers() {
            builder = builder.header(k, v);
        }
        builder.body(full_body(Bytes::new())).unwrap()
    }
}

fn parse_accept_encoding(header: Option<&str>) -> Vec<Encoding> {
    match header {
        None => vec![Encoding::Identity],
        Some(raw) => {
            let encs: Vec<Encoding> = raw
                .split(',')
                .filter_map(|part| Encoding::parse(part.split(';').next().unwrap_or("")))
                .collect();
            if encs.is_empty() {
                vec![Encoding::Identity]
            } else {
                encs
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accept_encoding_defaults_to_identity() {
        assert_eq!(parse_accept_encoding(None), vec![Encoding::Identity]);
        assert_eq!(parse_accept_encoding(Some("")), vec![Encoding::Identity]);
    }

    #[test]
    fn parse_accept_encoding_splits_and_trims() {
        let parsed = parse_accept_encoding(Some("br;q=0.9, gzip"));
        assert_eq!(parsed, vec![Encoding::Br, Encoding::Gzip]);
    }

    #[test]
    fn parse_accept_encoding_ignores_unknown_tokens() {
        let parsed = parse_accept_encoding(Some("zstd, gzip"));
        assert_eq!(parsed, vec![Encoding::Gzip]);
    }
}
