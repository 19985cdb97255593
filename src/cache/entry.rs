//! Cacheable-object model & transcoder.

use crate::codec::{self, Encoding};
use crate::error::GatewayError;
use crate::routing::HandlerResult;
use bytes::Bytes;

/// The unit stored in the cache. Invariants upheld by every constructor in
/// this module: `content-length` header always equals `body.len()`,
/// `content-encoding` is always one of `br|gzip|deflate|identity`, and
/// `x-cache-date` is present iff the entry has gone through
/// `store_with_timestamp`.
#[derive(Debug, Clone)]
pub struct CachedEntry {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl CachedEntry {
    /// Byte footprint charged against the cache's size budget.
    pub fn size(&self) -> usize {
        let header_bytes: usize = self
            .headers
            .iter()
            .map(|(k, v)| k.len() + v.len() + 2)
            .sum();
        header_bytes + self.body.len()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.remove_header(name);
        self.headers.push((name.to_string(), value.into()));
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn content_encoding(&self) -> Encoding {
        self.header("content-encoding")
            .and_then(Encoding::parse)
            .unwrap_or(Encoding::Identity)
    }
}

/// Pick the store encoding: the first of the preferred order that's also
/// acceptable to the caller. `acceptable` defaults to "everything but
/// identity" — the canonical store format is compressed.
fn pick_store_encoding(acceptable: &[Encoding]) -> Encoding {
    for enc in codec::preferred_order() {
        if acceptable.is_empty() || acceptable.contains(enc) {
            return *enc;
        }
    }
    Encoding::Identity
}

/// Default acceptable set: everything but identity — the canonical store
/// format is compressed.
pub fn canonical_acceptable() -> Vec<Encoding> {
    vec![Encoding::Br, Encoding::Gzip, Encoding::Deflate]
}

/// `toCacheable` — normalize a handler's result into a `CachedEntry`.
///
/// The decompress/recompress pair runs through `codec::*_async`, which
/// moves large payloads onto the blocking pool instead of running inline
/// on the async worker thread.
pub async fn to_cacheable(result: HandlerResult, acceptable: &[Encoding]) -> Result<CachedEntry, GatewayError> {
    let store_encoding = pick_store_encoding(acceptable);

    let (status, mut headers, raw_body) = match result {
        HandlerResult::Response { status, headers, body } => (status, headers, body),
        HandlerResult::Json(value) => {
            let body = serde_json::to_vec(&value).map_err(|e| GatewayError::Codec {
                encoding: "json",
                reason: e.to_string(),
            })?;
            (200, vec![("content-type".to_string(), "application/json".to_string())], Bytes::from(body))
        }
    };

    let current_encoding = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-encoding"))
        .and_then(|(_, v)| Encoding::parse(v))
        .unwrap_or(Encoding::Identity);

    let decompressed = codec::decompress_async(raw_body.to_vec(), current_encoding).await?;
    let compressed = codec::compress_async(decompressed, store_encoding).await?;

    headers.retain(|(k, _)| {
        !k.eq_ignore_ascii_case("content-encoding") && !k.eq_ignore_ascii_case("content-length")
    });
    headers.push(("content-encoding".to_string(), store_encoding.as_str().to_string()));
    headers.push(("content-length".to_string(), compressed.len().to_string()));

    Ok(CachedEntry {
        status,
        headers,
        body: Bytes::from(compressed),
    })
}

/// `transcode` — convert a cached entry to a different acceptable encoding,
/// never mutating the original.
pub async fn transcode(entry: &CachedEntry, acceptable: &[Encoding]) -> Result<CachedEntry, GatewayError> {
    let target = pick_store_encoding(acceptable);
    let current = entry.content_encoding();

    if target == current {
        return Ok(entry.clone());
    }

    let decompressed = codec::decompress_async(entry.body.to_vec(), current).await?;
    let recompressed = codec::compress_async(decompressed, target).await?;

    let mut out = entry.clone();
    out.body = Bytes::from(recompressed);
    out.set_header("content-encoding", target.as_str());
    out.set_header("content-length", out.body.len().to_string());
    Ok(out)
}

/// Tag `x-cache-date` with the current UTC timestamp. Called by the SWR
/// engine immediately before writing an entry to the store.
pub fn stamp_cache_date(entry: &mut CachedEntry) {
    entry.set_header("x-cache-date", chrono::Utc::now().to_rfc3339());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn to_cacheable_compresses_json_and_sets_headers() {
        let result = HandlerResult::Json(serde_json::json!({"ok": true}));
        let entry = to_cacheable(result, &canonical_acceptable()).await.unwrap();
        assert_eq!(entry.status, 200);
        assert!(entry.header("content-encoding").is_some());
        let len: usize = entry.header("content-length").unwrap().parse().unwrap();
        assert_eq!(len, entry.body.len());
    }

    #[tokio::test]
    async fn transcode_round_trips_body_bytes() {
        let result = HandlerResult::Json(serde_json::json!({"hello": "world"}));
        let entry = to_cacheable(result, &[Encoding::Gzip]).await.unwrap();
        assert_eq!(entry.content_encoding(), Encoding::Gzip);

        let transcoded = transcode(&entry, &[Encoding::Deflate]).await.unwrap();
        assert_eq!(transcoded.content_encoding(), Encoding::Deflate);

        let original_plain = codec::decompress(&entry.body, Encoding::Gzip).unwrap();
        let transcoded_plain = codec::decompress(&transcoded.body, Encoding::Deflate).unwrap();
        assert_eq!(original_plain, transcoded_plain);
    }

    #[tokio::test]
    async fn transcode_is_noop_when_already_matching() {
        let result = HandlerResult::Json(serde_json::json!({"x": 1}));
        let entry = to_cacheable(result, &[Encoding::Gzip]).await.unwrap();
        let transcoded = transcode(&entry, &[Encoding::Gzip]).await.unwrap();
        assert_eq!(transcoded.body, entry.body);
    }

    #[tokio::test]
    async fn stamp_cache_date_sets_header_once() {
        let mut entry = to_cacheable(HandlerResult::Json(serde_json::json!({})), &[Encoding::Identity]).await.unwrap();
        assert!(entry.header("x-cache-date").is_none());
        stamp_cache_date(&mut entry);
        assert!(entry.header("x-cache-date").is_some());
    }

    #[tokio::test]
    async fn content_length_invariant_holds_after_transcode() {
        let entry = to_cacheable(HandlerResult::Json(serde_json::json!([1, 2, 3])), &[Encoding::Gzip]).await.unwrap();
        let transcoded = transcode(&entry, &[Encoding::Br]).await.unwrap();
        let len: usize = transcoded.header("content-length").unwrap().parse().unwrap();
        assert_eq!(len, transcoded.body.len());
    }
}
