//! Pure header-transform CORS collaborator — not a cache or router
//! concern, invoked by the pipeline at the edges of the request.

use http::HeaderMap;

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allow_origin: String,
    pub allow_methods: String,
    pub allow_headers: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        CorsConfig {
            allow_origin: "*".to_string(),
            allow_methods: "GET, HEAD, OPTIONS, POST, PUT, PATCH, DELETE".to_string(),
            allow_headers: "*".to_string(),
        }
    }
}

impl CorsConfig {
    pub fn apply(&self, headers: &mut Vec<(String, String)>) {
        set_header(headers, "access-control-allow-origin", &self.allow_origin);
        set_header(headers, "access-control-allow-methods", &self.allow_methods);
        set_header(headers, "access-control-allow-headers", &self.allow_headers);
    }

    /// `OPTIONS` preflight → 204 with CORS headers only.
    pub fn preflight_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::new();
        self.apply(&mut headers);
        headers
    }

    pub fn is_preflight(method: &str, _headers: &HeaderMap) -> bool {
        method.eq_ignore_ascii_case("OPTIONS")
    }
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    headers.push((name.to_string(), value.to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_stamps_all_three_headers() {
        let cors = CorsConfig::default();
        let mut headers = Vec::new();
        cors.apply(&mut headers);
        assert!(headers.iter().any(|(k, _)| k == "access-control-allow-origin"));
        assert!(headers.iter().any(|(k, _)| k == "access-control-allow-methods"));
        assert!(headers.iter().any(|(k, _)| k == "access-control-allow-headers"));
    }

    #[test]
    fn apply_does_not_duplicate_on_repeated_calls() {
        let cors = CorsConfig::default();
        let mut headers = Vec::new();
        cors.apply(&mut headers);
        cors.apply(&mut headers);
        assert_eq!(
            headers.iter().filter(|(k, _)| k == "access-control-allow-origin").count(),
            1
        );
    }

    #[test]
    fn options_method_is_preflight() {
        assert!(CorsConfig::is_preflight("OPTIONS", &HeaderMap::new()));
        assert!(!CorsConfig::is_preflight("GET", &HeaderMap::new()));
    }
}
