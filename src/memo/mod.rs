//! Per-request memoization, bounded by request lifetime.
//!
//! A handful of values (derived cache key, negotiated encoding, client IP)
//! get computed once per request and read several times down the
//! pipeline. `OnceCell` gives interior "compute on first access" semantics
//! without a `Mutex`, since a single request is never touched from two
//! tasks concurrently.

use tokio::sync::OnceCell;

#[derive(Debug, Default)]
pub struct RequestMemo {
    cache_key: OnceCell<String>,
    negotiated_encoding: OnceCell<&'static str>,
    client_ip: OnceCell<String>,
}

impl RequestMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn cache_key_or_init<F>(&self, init: F) -> String
    where
        F: FnOnce() -> String,
    {
        self.cache_key.get_or_init(|| async { init() }).await.clone()
    }

    pub async fn negotiated_encoding_or_init<F>(&self, init: F) -> &'static str
    where
        F: FnOnce() -> &'static str,
    {
        *self.negotiated_encoding.get_or_init(|| async { init() }).await
    }

    pub async fn client_ip_or_init<F>(&self, init: F) -> String
    where
        F: FnOnce() -> String,
    {
        self.client_ip.get_or_init(|| async { init() }).await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn cache_key_computed_once() {
        let memo = RequestMemo::new();
        let calls = AtomicUsize::new(0);
        let a = memo
            .cache_key_or_init(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                "req:abc".to_string()
            })
            .await;
        let b = memo
            .cache_key_or_init(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                "req:zzz".to_string()
            })
            .await;
        assert_eq!(a, "req:abc");
        assert_eq!(b, "req:abc");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn independent_slots_do_not_interfere() {
        let memo = RequestMemo::new();
        let key = memo.cache_key_or_init(|| "req:1".to_string()).await;
        let enc = memo.negotiated_encoding_or_init(|| "br").await;
        assert_eq!(key, "req:1");
        assert_eq!(enc, "br");
    }
}
