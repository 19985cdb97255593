//! Stale-while-revalidate engine.
//!
//! Hit/miss decision procedure plus single-flight background
//! revalidation. State machine per key: `Absent → Populating → Fresh →
//! (Refreshing | Evicted) → Fresh | Absent`.

use crate::cache::{canonical_acceptable, to_cacheable, transcode, CacheStore};
use crate::codec::Encoding;
use crate::error::GatewayError;
use crate::routing::{Handler, HandlerRequest};
use dashmap::DashSet;
use std::sync::Arc;

/// `X-Cache` value stamped onto a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

pub struct SwrEngine {
    store: Arc<CacheStore>,
    in_flight: Arc<DashSet<String>>,
}

impl SwrEngine {
    pub fn new(store: Arc<CacheStore>) -> Self {
        SwrEngine {
            store,
            in_flight: Arc::new(DashSet::new()),
        }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Run the decision procedure for one request. Returns the entry to
    /// serve plus the `X-Cache` tag to stamp.
    pub async fn handle(
        &self,
        key: String,
        cacheable: bool,
        method: &str,
        acceptable: &[Encoding],
        request: HandlerRequest,
        handler: Handler,
    ) -> Result<(crate::cache::CachedEntry, CacheStatus), GatewayError> {
        let safe_method = matches!(method, "GET" | "HEAD" | "OPTIONS");

        if !cacheable || !safe_method {
            let result = handler(request).await?;
            let entry = to_cacheable(result, acceptable).await?;
            return Ok((entry, CacheStatus::Miss));
        }

        if let Some(stored) = self.store.get(&key) {
            if !stored.body.is_empty() {
                self.spawn_revalidation_if_absent(key, handler, request);
                let out = transcode_for_client(&stored, acceptable).await?;
                return Ok((out, CacheStatus::Hit));
            }
        }

        let result = handler(request).await?;
        let mut entry = to_cacheable(result, &canonical_acceptable()).await?;
        crate::cache::entry::stamp_cache_date(&mut entry);
        self.store.set(key, entry.clone());
        let out = transcode_for_client(&entry, acceptable).await?;
        Ok((out, CacheStatus::Miss))
    }

    /// Spawn background revalidation for `key` unless one is already
    /// running. The task is independent of the inbound connection's
    /// task — cancelling the request that triggered it must not cancel
    /// the refresh.
    fn spawn_revalidation_if_absent(&self, key: String, handler: Handler, request: HandlerRequest) {
        if !self.in_flight.insert(key.clone()) {
            return;
        }

        let store = self.store.clone();
        let in_flight = self.in_flight.clone();

        tokio::spawn(async move {
            let outcome = async {
                let result = handler(request).await?;
                let mut entry = to_cacheable(result, &canonical_acceptable()).await?;
                crate::cache::entry::stamp_cache_date(&mut entry);
                store.set(key.clone(), entry);
                Ok::<(), GatewayError>(())
            }
            .await;

            if let Err(err) = outcome {
                tracing::warn!(key = %key, error = %err, "background revalidation failed, evicting");
                store.delete(&key);
            }

            in_flight.remove(&key);
        });
    }
}

async fn transcode_for_client(
    entry: &crate::cache::CachedEntry,
    acceptable: &[Encoding],
) -> Result<crate::cache::CachedEntry, GatewayError> {
    if acceptable.is_empty() || acceptable.contains(&entry.content_encoding()) {
        return Ok(entry.clone());
    }
    transcode(entry, acceptable).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::HandlerResult;
    use http::HeaderMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn sample_request() -> HandlerRequest {
        HandlerRequest {
            method: "GET".to_string(),
            uri_path: "/widgets".to_string(),
            query: String::new(),
            headers: HeaderMap::new(),
            body: bytes::Bytes::new(),
            params: Default::default(),
            client_ip: None,
        }
    }

    #[tokio::test]
    async fn miss_runs_handler_and_stores_entry() {
        let engine = SwrEngine::new(Arc::new(CacheStore::new(1_000_000)));
        let handler: Handler = Arc::new(|_req| {
            Box::pin(async { Ok(HandlerResult::Json(serde_json::json!({"n": 1}))) })
        });

        let (entry, status) = engine
            .handle(
                "req:1".to_string(),
                true,
                "GET",
                &[Encoding::Identity],
                sample_request(),
                handler,
            )
            .await
            .unwrap();

        assert_eq!(status, CacheStatus::Miss);
        assert_eq!(entry.status, 200);
        assert!(engine.store().get("req:1").is_some());
    }

    #[tokio::test]
    async fn hit_returns_stale_copy_without_blocking() {
        let engine = SwrEngine::new(Arc::new(CacheStore::new(1_000_000)));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let handler: Handler = Arc::new(move |_req| {
            let calls = calls_clone.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(HandlerResult::Json(serde_json::json!({"n": 1})))
            })
        });

        engine
            .handle(
                "req:1".to_string(),
                true,
                "GET",
                &[Encoding::Identity],
                sample_request(),
                handler.clone(),
            )
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let (_, status) = engine
            .handle(
                "req:1".to_string(),
                true,
                "GET",
                &[Encoding::Identity],
                sample_request(),
                handler,
            )
            .await
            .unwrap();
        assert_eq!(status, CacheStatus::Hit);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_cacheable_route_never_touches_store() {
        let engine = SwrEngine::new(Arc::new(CacheStore::new(1_000_000)));
        let handler: Handler = Arc::new(|_req| {
            Box::pin(async { Ok(HandlerResult::Json(serde_json::json!({"n": 1}))) })
        });

        engine
            .handle(
                "req:1".to_string(),
                false,
                "GET",
                &[Encoding::Identity],
                sample_request(),
                handler,
            )
            .await
            .unwrap();

        assert!(engine.store().get("req:1").is_none());
    }

    #[tokio::test]
    async fn unsafe_method_bypasses_cache() {
        let engine = SwrEngine::new(Arc::new(CacheStore::new(1_000_000)));
        let handler: Handler = Arc::new(|_req| {
            Box::pin(async { Ok(HandlerResult::Json(serde_json::json!({"n": 1}))) })
        });

        let (_, status) = engine
            .handle(
                "req:1".to_string(),
                true,
                "POST",
                &[Encoding::Identity],
                sample_request(),
                handler,
            )
            .await
            .unwrap();
        assert_eq!(status, CacheStatus::Miss);
        assert!(engine.store().get("req:1").is_none());
    }

    #[tokio::test]
    async fn revalidation_failure_evicts_entry() {
        let engine = SwrEngine::new(Arc::new(CacheStore::new(1_000_000)));
        let ok_handler: Handler = Arc::new(|_req| {
            Box::pin(async { Ok(HandlerResult::Json(serde_json::json!({"n": 1}))) })
        });
        engine
            .handle(
                "req:1".to_string(),
                true,
                "GET",
                &[Encoding::Identity],
                sample_request(),
                ok_handler,
            )
            .await
            .unwrap();
        assert!(engine.store().get("req:1").is_some());

        let failing_handler: Handler = Arc::new(|_req| {
            Box::pin(async { Err(GatewayError::Route { status_code: 502, response_text: None }) })
        });
        engine
            .handle(
                "req:1".to_string(),
                true,
                "GET",
                &[Encoding::Identity],
                sample_request(),
                failing_handler,
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(engine.store().get("req:1").is_none());
    }
}
