//! Upstream HTTP client — the transport the reverse-proxy handler issues
//! requests over.
//!
//! This gateway's proxy routes each target one static origin, so there is
//! no load balancer, circuit breaker, or health-check machinery here (see
//! DESIGN.md for what was dropped and why): a pooled
//! `hyper_util::client::legacy::Client` over `hyper-rustls` is all a
//! single-origin proxy needs.

use crate::proxy::BoxBody;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

/// A generous connect/request timeout, bounding an otherwise unbounded
/// I/O wait on every upstream call.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct UpstreamClient {
    inner: Client<hyper_rustls::HttpsConnector<HttpConnector>, BoxBody>,
}

impl UpstreamClient {
    pub fn new() -> Self {
        let mut http = HttpConnector::new();
        http.set_connect_timeout(Some(CONNECT_TIMEOUT));
        http.enforce_http(false);

        let https = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .wrap_connector(http);

        let inner = Client::builder(TokioExecutor::new()).build(https);
        UpstreamClient { inner }
    }

    pub fn inner(&self) -> &Client<hyper_rustls::HttpsConnector<HttpConnector>, BoxBody> {
        &self.inner
    }
}

impl Default for UpstreamClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Static description of where a proxy route forwards to — scheme, host,
/// port, and a path template substituted with the route's path params
/// via `CompiledPattern::construct_url`.
#[derive(Debug, Clone)]
pub struct ProxyTarget {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub path_template: crate::routing::CompiledPattern,
}

impl ProxyTarget {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: u16, path_template: &str) -> Self {
        ProxyTarget {
            scheme: scheme.into(),
            host: host.into(),
            port,
            path_template: crate::routing::CompiledPattern::compile(path_template),
        }
    }

    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
