//! Reverse proxy handler: `proxy_route` factory producing a `RouteSpec`
//! whose handler forwards to a single static upstream origin.
//!
//! Header hygiene, forwarded-header injection, and encoding negotiation,
//! simplified to a single target — no load balancer, circuit breaker, or
//! health check, since this gateway's proxy routes don't discover
//! clusters.

use crate::codec::{self, Encoding};
use crate::error::GatewayError;
use crate::routing::{Handler, HandlerFuture, HandlerRequest, HandlerResult, RouteSpec};
use crate::upstream::{ProxyTarget, UpstreamClient};
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Request, Uri};
use http_body_util::{BodyExt, Full};
use std::net::IpAddr;
use std::sync::Arc;

const STRIP_HEADERS: &[&str] = &[
    "host",
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
    "strict-transport-security",
    "content-security-policy",
    "public-key-pins",
];

/// This gateway never terminates inbound TLS, so the scheme a client
/// reached it on is always `http`; `X-Forwarded-Proto` reflects that, not
/// the upstream's scheme.
const INBOUND_SCHEME: &str = "http";

const MULTIPART_PREFIX: &str = "multipart/form-data";

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start().to_ascii_lowercase().starts_with(MULTIPART_PREFIX))
        .unwrap_or(false)
}

/// Build a `RouteSpec` that forwards matching requests to `target`.
pub fn proxy_route(path: &str, target: ProxyTarget, cacheable: bool, client: UpstreamClient) -> RouteSpec {
    let target = Arc::new(target);
    let handler: Handler = Arc::new(move |req: HandlerRequest| {
        let target = target.clone();
        let client = client.clone();
        Box::pin(async move { forward(req, &target, &client).await }) as HandlerFuture
    });
    RouteSpec::new(path, cacheable, handler)
}

async fn forward(
    req: HandlerRequest,
    target: &ProxyTarget,
    client: &UpstreamClient,
) -> Result<HandlerResult, GatewayError> {
    let path = target.path_template.construct_url(&req.params)?;
    let mut uri_string = format!("{}://{}{}", target.scheme, target.authority(), path);
    if !req.query.is_empty() {
        uri_string.push('?');
        uri_string.push_str(&req.query);
    }

    let uri: Uri = uri_string.parse().map_err(|e: http::uri::InvalidUri| GatewayError::Route {
        status_code: 502,
        response_text: Some(format!("invalid upstream uri: {}", e)),
    })?;

    let original_headers = req.headers.clone();
    let client_ip = derive_client_ip(req.client_ip, &original_headers);
    let method: http::Method = req.method.parse().unwrap_or(http::Method::GET);
    let multipart = is_multipart(&original_headers);
    let body_len = req.body.len();

    let mut headers = req.headers;
    strip_hop_and_transport_headers(&mut headers);
    if let Some(ip) = client_ip {
        set_header(&mut headers, "x-forwarded-for", &ip.to_string());
    }
    if let Some(host) = original_headers.get("host").and_then(|v| v.to_str().ok()) {
        set_header(&mut headers, "x-forwarded-host", host);
    }
    set_header(&mut headers, "x-forwarded-proto", INBOUND_SCHEME);

    if multipart {
        // The inbound content-length/content-type are dropped and
        // regenerated from the body actually being forwarded (same
        // boundary, recomputed length) rather than trusted as-is — this
        // gateway doesn't re-parse multipart parts, it only re-frames the
        // headers around the byte-for-byte body it forwards.
        let content_type = original_headers.get("content-type").cloned();
        headers.remove("content-length");
        headers.remove("content-type");
        if let Some(ct) = content_type {
            headers.insert(HeaderName::from_static("content-type"), ct);
        }
        set_header(&mut headers, "content-length", &body_len.to_string());
    }

    let body = Full::new(req.body).map_err(|never| match never {}).boxed();

    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(map) = builder.headers_mut() {
        *map = headers;
    }
    let upstream_req = builder.body(body).map_err(|e| GatewayError::Route {
        status_code: 502,
        response_text: Some(e.to_string()),
    })?;

    let response = client
        .inner()
        .request(upstream_req)
        .await
        .map_err(|e| GatewayError::Route {
            status_code: 502,
            response_text: Some(format!("upstream connect/read failure: {}", e)),
        })?;

    let status = response.status();
    let resp_headers: Vec<(String, String)> = response
        .headers()
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
        .collect();

    let body_bytes = response
        .into_body()
        .collect()
        .await
        .map_err(|e| GatewayError::Route {
            status_code: 502,
            response_text: Some(format!("failed to read upstream body: {}", e)),
        })?
        .to_bytes();

    if !status.is_success() {
        return Err(GatewayError::Route {
            status_code: status.as_u16(),
            response_text: Some(String::from_utf8_lossy(&body_bytes).into_owned()),
        });
    }

    // Normalize to identity — the SWR engine re-compresses canonically on
    // store, so the proxy handler never hands back a pre-compressed body.
    let current_encoding = resp_headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-encoding"))
        .and_then(|(_, v)| Encoding::parse(v))
        .unwrap_or(Encoding::Identity);
    let decoded = codec::decompress_async(body_bytes.to_vec(), current_encoding).await?;

    let out_headers: Vec<(String, String)> = resp_headers
        .into_iter()
        .filter(|(k, _)| {
            !k.eq_ignore_ascii_case("content-encoding") && !k.eq_ignore_ascii_case("content-length")
        })
        .collect();

    Ok(HandlerResult::Response {
        status: status.as_u16(),
        headers: out_headers,
        body: Bytes::from(decoded),
    })
}

fn strip_hop_and_transport_headers(headers: &mut HeaderMap) {
    for name in STRIP_HEADERS {
        headers.remove(*name);
    }
}

/// Derive the downstream client IP: check the TCP peer address first,
/// then fall back through `x-forwarded-for` (first element),
/// `x-client-ip`, `x-azure-forwarded-for` (first element), `x-real-ip`,
/// and `forwarded` (`for="…"`) — first hit wins.
fn derive_client_ip(peer: Option<IpAddr>, headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(ip) = peer {
        return Some(ip);
    }

    for name in ["x-forwarded-for", "x-client-ip", "x-azure-forwarded-for", "x-real-ip"] {
        if let Some(first) = first_value(headers, name) {
            if let Ok(ip) = first.trim().parse::<IpAddr>() {
                return Some(ip);
            }
        }
    }

    if let Some(forwarded) = headers.get("forwarded").and_then(|v| v.to_str().ok()) {
        if let Some(ip) = parse_forwarded_for(forwarded) {
            return Some(ip);
        }
    }

    None
}

fn first_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
}

fn parse_forwarded_for(value: &str) -> Option<IpAddr> {
    value.split(';').find_map(|part| {
        let part = part.trim();
        let rest = part.strip_prefix("for=")?;
        let rest = rest.trim_matches('"');
        rest.parse::<IpAddr>().ok()
    })
}

fn set_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(HeaderName::from_static(name), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_client_ip_prefers_tcp_peer() {
        let headers = HeaderMap::new();
        let peer: IpAddr = "10.0.0.1".parse().unwrap();
        assert_eq!(derive_client_ip(Some(peer), &headers), Some(peer));
    }

    #[test]
    fn derive_client_ip_falls_back_to_x_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.5, 10.0.0.2".parse().unwrap());
        assert_eq!(
            derive_client_ip(None, &headers),
            Some("203.0.113.5".parse().unwrap())
        );
    }

    #[test]
    fn derive_client_ip_falls_back_to_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("forwarded", "for=\"198.51.100.2\";proto=https".parse().unwrap());
        assert_eq!(
            derive_client_ip(None, &headers),
            Some("198.51.100.2".parse().unwrap())
        );
    }

    #[test]
    fn derive_client_ip_none_when_nothing_present() {
        let headers = HeaderMap::new();
        assert_eq!(derive_client_ip(None, &headers), None);
    }

    #[test]
    fn strip_hop_and_transport_headers_removes_listed_names() {
        let mut headers = HeaderMap::new();
        headers.insert("host", "example.com".parse().unwrap());
        headers.insert("connection", "keep-alive".parse().unwrap());
        headers.insert("strict-transport-security", "max-age=0".parse().unwrap());
        headers.insert("x-keep-me", "yes".parse().unwrap());
        strip_hop_and_transport_headers(&mut headers);
        assert!(headers.get("host").is_none());
        assert!(headers.get("connection").is_none());
        assert!(headers.get("strict-transport-security").is_none());
        assert!(headers.get("x-keep-me").is_some());
    }

    #[test]
    fn is_multipart_detects_content_type_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            "multipart/form-data; boundary=----abc123".parse().unwrap(),
        );
        assert!(is_multipart(&headers));
    }

    #[test]
    fn is_multipart_false_for_other_content_types() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        assert!(!is_multipart(&headers));
        assert!(!is_multipart(&HeaderMap::new()));
    }
}
