//! URL-pattern compiler: `:name` (required) and `:name?` (optional) path
//! segments.

use crate::error::GatewayError;
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Required(String),
    Optional(String),
}

/// A compiled path pattern, e.g. `/users/:id/posts/:slug?`.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl CompiledPattern {
    pub fn compile(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|raw_seg| {
                if let Some(name) = raw_seg.strip_prefix(':') {
                    if let Some(name) = name.strip_suffix('?') {
                        Segment::Optional(name.to_string())
                    } else {
                        Segment::Required(name.to_string())
                    }
                } else {
                    Segment::Literal(raw_seg.to_string())
                }
            })
            .collect();
        CompiledPattern {
            raw: pattern.to_string(),
            segments,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Match a request path against this pattern, returning extracted
    /// params on success.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = HashMap::new();
        let mut pi = 0usize;

        for seg in &self.segments {
            match seg {
                Segment::Literal(lit) => {
                    let candidate = path_segments.get(pi)?;
                    if candidate != lit {
                        return None;
                    }
                    pi += 1;
                }
                Segment::Required(name) => {
                    let candidate = path_segments.get(pi)?;
                    params.insert(name.clone(), candidate.to_string());
                    pi += 1;
                }
                Segment::Optional(name) => {
                    if let Some(candidate) = path_segments.get(pi) {
                        params.insert(name.clone(), candidate.to_string());
                        pi += 1;
                    }
                }
            }
        }

        if pi != path_segments.len() {
            return None;
        }
        Some(params)
    }

    /// Substitute `:name`/`:name?` segments with values from `params`.
    /// Missing mandatory params fail; missing optional params resolve to
    /// the empty string (and are simply omitted from the constructed
    /// path, leaving no dangling segment).
    pub fn construct_url(&self, params: &HashMap<String, String>) -> Result<String, GatewayError> {
        let mut parts = Vec::new();
        for seg in &self.segments {
            match seg {
                Segment::Literal(lit) => parts.push(lit.clone()),
                Segment::Required(name) => match params.get(name) {
                    Some(v) => parts.push(v.clone()),
                    None => return Err(GatewayError::ParamMissing(name.clone())),
                },
                Segment::Optional(name) => {
                    if let Some(v) = params.get(name) {
                        if !v.is_empty() {
                            parts.push(v.clone());
                        }
                    }
                }
            }
        }
        Ok(format!("/{}", parts.join("/")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_literal_and_required() {
        let p = CompiledPattern::compile("/users/:id");
        let params = p.matches("/users/42").unwrap();
        assert_eq!(params.get("id").unwrap(), "42");
        assert!(p.matches("/users").is_none());
        assert!(p.matches("/users/42/extra").is_none());
    }

    #[test]
    fn matches_optional_trailing_segment() {
        let p = CompiledPattern::compile("/posts/:slug?");
        assert!(p.matches("/posts").unwrap().get("slug").is_none());
        assert_eq!(p.matches("/posts/hello").unwrap().get("slug").unwrap(), "hello");
    }

    #[test]
    fn construct_url_fills_required() {
        let p = CompiledPattern::compile("/users/:id/posts/:slug?");
        let mut params = HashMap::new();
        params.insert("id".to_string(), "7".to_string());
        assert_eq!(p.construct_url(&params).unwrap(), "/users/7/posts");
        params.insert("slug".to_string(), "hi".to_string());
        assert_eq!(p.construct_url(&params).unwrap(), "/users/7/posts/hi");
    }

    #[test]
    fn construct_url_fails_on_missing_required() {
        let p = CompiledPattern::compile("/users/:id");
        let err = p.construct_url(&HashMap::new()).unwrap_err();
        matches!(err, GatewayError::ParamMissing(ref n) if n == "id");
    }
}
