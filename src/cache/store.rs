//! Byte-sized LRU cache store.
//!
//! Eviction is driven by a byte-cost budget, not an entry count, so the
//! underlying `lru::LruCache` is given an effectively unbounded slot count
//! and this module does the size accounting + eviction itself.

use crate::cache::entry::CachedEntry;
use lru::LruCache;
use parking_lot::Mutex;

struct Inner {
    lru: LruCache<String, CachedEntry>,
    used_bytes: u64,
}

pub struct CacheStore {
    inner: Mutex<Inner>,
    max_bytes: u64,
}

impl CacheStore {
    pub fn new(max_bytes: u64) -> Self {
        CacheStore {
            inner: Mutex::new(Inner {
                lru: LruCache::unbounded(),
                used_bytes: 0,
            }),
            max_bytes,
        }
    }

    /// Returns the entry and marks it most-recently-used, even if the
    /// caller considers it stale — staleness is an SWR concept, not a
    /// store concept.
    pub fn get(&self, key: &str) -> Option<CachedEntry> {
        let mut inner = self.inner.lock();
        inner.lru.get(key).cloned()
    }

    /// Replace any prior entry for `key` atomically and evict LRU entries
    /// until back under budget.
    pub fn set(&self, key: String, entry: CachedEntry) {
        let mut inner = self.inner.lock();
        let new_size = entry.size() as u64;

        if let Some(old) = inner.lru.peek(&key) {
            inner.used_bytes = inner.used_bytes.saturating_sub(old.size() as u64);
        }
        inner.lru.put(key, entry);
        inner.used_bytes += new_size;

        while inner.used_bytes > self.max_bytes {
            match inner.lru.pop_lru() {
                Some((_, evicted)) => {
                    inner.used_bytes = inner.used_bytes.saturating_sub(evicted.size() as u64);
                }
                None => break,
            }
        }
    }

    pub fn delete(&self, key: &str) -> Option<CachedEntry> {
        let mut inner = self.inner.lock();
        let removed = inner.lru.pop(key);
        if let Some(ref entry) = removed {
            inner.used_bytes = inner.used_bytes.saturating_sub(entry.size() as u64);
        }
        removed
    }

    pub fn used_bytes(&self) -> u64 {
        self.inner.lock().used_bytes
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot all entries, most-recently-used first, for persistence.
    pub fn dump(&self) -> Vec<(String, CachedEntry)> {
        let inner = self.inner.lock();
        inner
            .lru
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Bulk-load entries (oldest-first in the iterator becomes LRU end),
    /// evicting as needed to respect the byte budget. Used on warm start
    /// from the sidecar file.
    pub fn load(&self, entries: Vec<(String, CachedEntry)>) {
        for (key, entry) in entries {
            self.set(key, entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn entry_of_size(n: usize) -> CachedEntry {
        CachedEntry {
            status: 200,
            headers: vec![],
            body: Bytes::from(vec![b'x'; n]),
        }
    }

    #[test]
    fn set_then_get_round_trips() {
        let store = CacheStore::new(1_000_000);
        store.set("req:1".to_string(), entry_of_size(10));
        let got = store.get("req:1").unwrap();
        assert_eq!(got.body.len(), 10);
    }

    #[test]
    fn get_marks_most_recently_used() {
        let store = CacheStore::new(30);
        store.set("a".to_string(), entry_of_size(10));
        store.set("b".to_string(), entry_of_size(10));
        // Touch "a" so it's MRU; inserting "c" should evict "b" instead.
        store.get("a");
        store.set("c".to_string(), entry_of_size(10));
        assert!(store.get("a").is_some());
        assert!(store.get("b").is_none());
        assert!(store.get("c").is_some());
    }

    #[test]
    fn eviction_respects_byte_budget() {
        let store = CacheStore::new(25);
        store.set("a".to_string(), entry_of_size(10));
        store.set("b".to_string(), entry_of_size(10));
        store.set("c".to_string(), entry_of_size(10));
        assert!(store.used_bytes() <= 25);
        assert!(store.get("a").is_none());
        assert!(store.get("c").is_some());
    }

    #[test]
    fn delete_removes_and_frees_budget() {
        let store = CacheStore::new(1_000);
        store.set("a".to_string(), entry_of_size(50));
        assert_eq!(store.used_bytes(), 50);
        let removed = store.delete("a");
        assert!(removed.is_some());
        assert_eq!(store.used_bytes(), 0);
        assert!(store.get("a").is_none());
    }

    #[test]
    fn set_replaces_prior_entry_size_correctly() {
        let store = CacheStore::new(1_000);
        store.set("a".to_string(), entry_of_size(10));
        store.set("a".to_string(), entry_of_size(40));
        assert_eq!(store.len(), 1);
        assert_eq!(store.used_bytes(), 40);
    }

    #[test]
    fn dump_and_load_preserve_entries() {
        let store = CacheStore::new(1_000);
        store.set("a".to_string(), entry_of_size(10));
        store.set("b".to_string(), entry_of_size(20));
        let dumped = store.dump();

        let restored = CacheStore::new(1_000);
        restored.load(dumped);
        assert_eq!(restored.len(), 2);
        assert!(restored.get("a").is_some());
        assert!(restored.get("b").is_some());
    }
}
