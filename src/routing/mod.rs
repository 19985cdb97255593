//! Router: compile URL patterns, match requests, extract path params.

mod pattern;

pub use pattern::CompiledPattern;

use crate::error::GatewayError;
use bytes::Bytes;
use http::HeaderMap;
use std::collections::HashMap;
use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::sync::Arc;

/// What a compiled route's handler is given: the matched path params plus
/// everything about the inbound request a handler could need.
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    pub method: String,
    pub uri_path: String,
    pub query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub params: HashMap<String, String>,
    pub client_ip: Option<IpAddr>,
}

/// What a handler produces, before it's normalized into a `CachedEntry`.
#[derive(Debug, Clone)]
pub enum HandlerResult {
    Response {
        status: u16,
        headers: Vec<(String, String)>,
        body: Bytes,
    },
    Json(serde_json::Value),
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<HandlerResult, GatewayError>> + Send>>;
pub type Handler = Arc<dyn Fn(HandlerRequest) -> HandlerFuture + Send + Sync>;

#[derive(Clone)]
pub struct RouteSpec {
    pub pattern: CompiledPattern,
    pub cacheable: bool,
    pub handler: Handler,
}

impl RouteSpec {
    pub fn new(path: &str, cacheable: bool, handler: Handler) -> Self {
        RouteSpec {
            pattern: CompiledPattern::compile(path),
            cacheable,
            handler,
        }
    }
}

/// Compiled, immutable route table. Matching walks routes in REVERSE
/// insertion order — a later-declared route wins over an earlier one that
/// also matches. This tie-break is intentional and must be preserved.
pub struct RouteTable {
    routes: Vec<RouteSpec>,
}

impl RouteTable {
    pub fn compile(routes: Vec<RouteSpec>) -> Self {
        RouteTable { routes }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn match_route(&self, path: &str) -> Option<(&RouteSpec, HashMap<String, String>)> {
        self.routes
            .iter()
            .rev()
            .find_map(|route| route.pattern.matches(path).map(|params| (route, params)))
    }
}
