//! Request-key derivation.
//!
//! `"req:" + hex(xxh64(pathname + sortedQuery + salt))`, with HEAD/OPTIONS
//! prefixed separately so they never collide with a GET entry for the
//! same URL.

use xxhash_rust::xxh64::xxh64;

const HASH_SEED: u64 = 0;

/// Sort query params by name (stable, ascending Unicode code point order)
/// and rebuild a canonical `a=1&b=2` query string. Params with the same
/// name keep their relative order (stable sort).
pub fn canonical_query(query: &str) -> String {
    if query.is_empty() {
        return String::new();
    }
    let mut pairs: Vec<(&str, &str)> = query
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|p| match p.split_once('=') {
            Some((k, v)) => (k, v),
            None => (p, ""),
        })
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the raw cache key string for a pathname + query, before hex
/// hashing. Exposed separately so callers can prefix it by method.
fn key_material(pathname: &str, query: &str, salt: &str) -> String {
    format!("{}?{}{}", pathname, canonical_query(query), salt)
}

/// `url_key` — derive a stable key for a URL on its own (no method
/// namespace), used when the caller needs to fingerprint a URL rather
/// than a request.
pub fn url_key(pathname: &str, query: &str, salt: &str) -> String {
    let material = key_material(pathname, query, salt);
    format!("u:{:016x}", xxh64(material.as_bytes(), HASH_SEED))
}

/// `request_key` — derive a cache key for a request, prefixing the method
/// for HEAD/OPTIONS so they never alias a GET entry.
pub fn request_key(method: &str, pathname: &str, query: &str, salt: &str) -> String {
    let material = key_material(pathname, query, salt);
    let digest = xxh64(material.as_bytes(), HASH_SEED);
    match method.to_ascii_uppercase().as_str() {
        "HEAD" => format!("req:HEAD:{:016x}", digest),
        "OPTIONS" => format!("req:OPTIONS:{:016x}", digest),
        _ => format!("req:{:016x}", digest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_order_does_not_affect_key() {
        let a = url_key("/widgets", "b=2&a=1", "");
        let b = url_key("/widgets", "a=1&b=2", "");
        assert_eq!(a, b);
    }

    #[test]
    fn different_paths_produce_different_keys() {
        let a = url_key("/widgets", "", "");
        let b = url_key("/gadgets", "", "");
        assert_ne!(a, b);
    }

    #[test]
    fn salt_changes_key() {
        let a = url_key("/widgets", "", "v1");
        let b = url_key("/widgets", "", "v2");
        assert_ne!(a, b);
    }

    #[test]
    fn head_and_options_do_not_alias_get() {
        let get_key = request_key("GET", "/widgets", "", "");
        let head_key = request_key("HEAD", "/widgets", "", "");
        let options_key = request_key("OPTIONS", "/widgets", "", "");
        assert_ne!(get_key, head_key);
        assert_ne!(get_key, options_key);
        assert_ne!(head_key, options_key);
    }

    #[test]
    fn post_key_shares_namespace_with_get() {
        // Non-GET/HEAD/OPTIONS methods are never cached (see swr decision
        // procedure), so they intentionally share the bare "req:" prefix —
        // nothing consults a key derived this way for them.
        let get_key = request_key("GET", "/widgets", "", "");
        let put_key = request_key("PUT", "/widgets", "", "");
        assert_eq!(get_key, put_key);
    }

    #[test]
    fn canonical_query_handles_repeated_names_stably() {
        let q = canonical_query("z=1&a=2&a=1");
        assert_eq!(q, "a=2&a=1&z=1");
    }

    #[test]
    fn canonical_query_empty_is_empty() {
        assert_eq!(canonical_query(""), "");
    }

    #[test]
    fn key_is_deterministic_across_calls() {
        let a = url_key("/x", "q=1", "s");
        let b = url_key("/x", "q=1", "s");
        assert_eq!(a, b);
    }
}
