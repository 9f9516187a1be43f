//! Cache Store Module
//!
//! Single-owner cache engine combining HashMap storage with LRU tracking and
//! TTL expiration. Not synchronized; `ResponseCache` wraps it in a lock.
//!
//! Each time-dependent operation has an `*_at` variant taking an explicit
//! Unix-millisecond clock, which the plain variant calls with the wall clock.

use std::collections::HashMap;
use std::time::Duration;

use regex::Regex;

use crate::cache::entry::current_timestamp_ms;
use crate::cache::{CacheEntry, CacheKey, CacheStats, CachedResponse, LruTracker};

// == Cache Store ==
#[derive(Debug)]
pub struct CacheStore {
    entries: HashMap<String, CacheEntry>,
    lru: LruTracker,
    stats: CacheStats,
    max_entries: usize,
    default_ttl: Duration,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a store holding at most `max_entries`, with `default_ttl` for
    /// entries stored without an override.
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            max_entries,
            default_ttl,
        }
    }

    // == Get ==
    /// Returns a live entry, refreshing its recency. Expired entries are
    /// removed and counted as misses.
    pub fn get_at(&mut self, key: &str, now: u64) -> Option<CacheEntry> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired_at(now),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if expired {
            self.remove(key);
            self.stats.record_miss();
            return None;
        }

        self.stats.record_hit();
        self.lru.touch(key);
        let entry = self.entries.get_mut(key)?;
        entry.last_accessed_at = now;
        Some(entry.clone())
    }

    pub fn get(&mut self, key: &str) -> Option<CacheEntry> {
        self.get_at(key, current_timestamp_ms())
    }

    // == Set ==
    /// Inserts or replaces the entry for `key`.
    ///
    /// When a new key would exceed capacity, the least recently used entry is
    /// evicted first. With a capacity of zero nothing is stored.
    pub fn set_at(
        &mut self,
        key: &CacheKey,
        payload: CachedResponse,
        ttl: Option<Duration>,
        now: u64,
    ) {
        if self.max_entries == 0 {
            return;
        }

        let rendered = key.to_string();
        if !self.entries.contains_key(&rendered) {
            while self.entries.len() >= self.max_entries {
                if !self.evict_one() {
                    break;
                }
            }
        }

        let entry = CacheEntry::new(
            rendered.clone(),
            key.route().to_string(),
            payload,
            ttl.unwrap_or(self.default_ttl),
            now,
        );
        self.entries.insert(rendered.clone(), entry);
        self.lru.touch(&rendered);
    }

    pub fn set(&mut self, key: &CacheKey, payload: CachedResponse, ttl: Option<Duration>) {
        self.set_at(key, payload, ttl, current_timestamp_ms());
    }

    // == Invalidation ==
    /// Removes every entry whose key belongs to `route`.
    pub fn invalidate_route(&mut self, route: &str) -> usize {
        self.remove_where(|entry| entry.route == route)
    }

    /// Removes every entry whose rendered key matches `pattern`.
    pub fn invalidate_matching(&mut self, pattern: &Regex) -> usize {
        self.remove_where(|entry| pattern.is_match(&entry.key))
    }

    /// Removes every expired entry without waiting for a read.
    pub fn invalidate_expired_at(&mut self, now: u64) -> usize {
        self.remove_where(|entry| entry.is_expired_at(now))
    }

    pub fn invalidate_expired(&mut self) -> usize {
        self.invalidate_expired_at(current_timestamp_ms())
    }

    /// Removes all entries. Counters are kept.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.lru.clear();
        count
    }

    // == Reconfigure ==
    /// Applies new limits. Shrinking evicts least recently used entries until
    /// the store fits; returns how many were evicted.
    pub fn reconfigure(&mut self, max_entries: usize, default_ttl: Duration) -> usize {
        self.max_entries = max_entries;
        self.default_ttl = default_ttl;

        let mut evicted = 0;
        while self.entries.len() > self.max_entries && self.evict_one() {
            evicted += 1;
        }
        evicted
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            max_size: self.max_entries,
            ..self.stats.clone()
        }
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Presence check that does not touch recency or counters.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    // == Internals ==
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        self.lru.remove(key);
        self.entries.remove(key)
    }

    fn evict_one(&mut self) -> bool {
        match self.lru.evict_oldest() {
            Some(victim) => {
                self.entries.remove(&victim);
                self.stats.record_eviction();
                true
            }
            None => false,
        }
    }

    fn remove_where(&mut self, predicate: impl Fn(&CacheEntry) -> bool) -> usize {
        let doomed: Vec<String> = self
            .entries
            .values()
            .filter(|entry| predicate(entry))
            .map(|entry| entry.key.clone())
            .collect();

        for key in &doomed {
            self.remove(key);
        }
        doomed.len()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::HeaderBag;
    use bytes::Bytes;

    const TTL: Duration = Duration::from_millis(300_000);

    fn payload(body: &'static str) -> CachedResponse {
        CachedResponse {
            status: 200,
            headers: HeaderBag::new(),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    fn key(route: &str, path: &str) -> CacheKey {
        CacheKey::new(route, "GET", path, &[])
    }

    #[test]
    fn test_store_set_and_get() {
        let mut store = CacheStore::new(10, TTL);
        let k = key("api", "/posts/1");

        store.set(&k, payload("one"), None);
        let entry = store.get(&k.to_string()).unwrap();

        assert_eq!(entry.payload.body, Bytes::from_static(b"one"));
        assert_eq!(entry.route, "api");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_missing_counts_miss() {
        let mut store = CacheStore::new(10, TTL);
        assert!(store.get("nope").is_none());
        assert_eq!(store.stats().misses, 1);
        assert_eq!(store.stats().hits, 0);
    }

    #[test]
    fn test_store_overwrite_keeps_single_entry() {
        let mut store = CacheStore::new(10, TTL);
        let k = key("api", "/a");

        store.set(&k, payload("v1"), None);
        store.set(&k, payload("v2"), None);

        assert_eq!(store.len(), 1);
        let entry = store.get(&k.to_string()).unwrap();
        assert_eq!(entry.payload.body, Bytes::from_static(b"v2"));
    }

    #[test]
    fn test_store_lazy_expiry() {
        let mut store = CacheStore::new(10, TTL);
        let k = key("api", "/a");

        store.set_at(&k, payload("v"), Some(Duration::from_millis(100)), 1_000);

        assert!(store.get_at(&k.to_string(), 1_099).is_some());
        assert!(store.get_at(&k.to_string(), 1_100).is_none());
        assert!(!store.contains(&k.to_string()));

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 0);
    }

    #[test]
    fn test_store_default_ttl_applies() {
        let mut store = CacheStore::new(10, Duration::from_millis(50));
        let k = key("api", "/a");

        store.set_at(&k, payload("v"), None, 0);

        assert!(store.get_at(&k.to_string(), 49).is_some());
        assert!(store.get_at(&k.to_string(), 50).is_none());
    }

    #[test]
    fn test_store_hit_updates_last_accessed() {
        let mut store = CacheStore::new(10, TTL);
        let k = key("api", "/a");

        store.set_at(&k, payload("v"), None, 1_000);
        let entry = store.get_at(&k.to_string(), 2_500).unwrap();

        assert_eq!(entry.created_at, 1_000);
        assert_eq!(entry.last_accessed_at, 2_500);
    }

    #[test]
    fn test_store_lru_eviction_respects_reads() {
        let mut store = CacheStore::new(2, TTL);
        let (a, b, c) = (key("r", "/a"), key("r", "/b"), key("r", "/c"));

        store.set(&a, payload("a"), None);
        store.set(&b, payload("b"), None);
        store.get(&a.to_string()).unwrap();
        store.set(&c, payload("c"), None);

        assert!(store.contains(&a.to_string()));
        assert!(!store.contains(&b.to_string()));
        assert!(store.contains(&c.to_string()));
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_store_zero_capacity_stores_nothing() {
        let mut store = CacheStore::new(0, TTL);
        store.set(&key("r", "/a"), payload("a"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_invalidate_route() {
        let mut store = CacheStore::new(10, TTL);
        store.set(&key("users", "/1"), payload("u1"), None);
        store.set(&key("users", "/2"), payload("u2"), None);
        store.set(&key("posts", "/1"), payload("p1"), None);

        assert_eq!(store.invalidate_route("users"), 2);
        assert_eq!(store.len(), 1);
        assert!(store.contains(&key("posts", "/1").to_string()));
        assert_eq!(store.invalidate_route("users"), 0);
    }

    #[test]
    fn test_store_invalidate_matching() {
        let mut store = CacheStore::new(10, TTL);
        store.set(&key("users", "/1"), payload("u1"), None);
        store.set(&key("users", "/2/comments"), payload("c"), None);
        store.set(&key("posts", "/1"), payload("p1"), None);

        let pattern = Regex::new("comments").unwrap();
        assert_eq!(store.invalidate_matching(&pattern), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_store_invalidate_expired() {
        let mut store = CacheStore::new(10, TTL);
        store.set_at(&key("r", "/a"), payload("a"), Some(Duration::from_millis(10)), 0);
        store.set_at(&key("r", "/b"), payload("b"), Some(Duration::from_millis(1_000)), 0);

        assert_eq!(store.invalidate_expired_at(500), 1);
        assert_eq!(store.len(), 1);
        assert!(store.contains(&key("r", "/b").to_string()));
        // sweeping does not count as lookups
        assert_eq!(store.stats().misses, 0);
    }

    #[test]
    fn test_store_clear_keeps_counters() {
        let mut store = CacheStore::new(10, TTL);
        store.set(&key("r", "/a"), payload("a"), None);
        store.get(&key("r", "/a").to_string());

        assert_eq!(store.clear(), 1);
        assert!(store.is_empty());
        assert_eq!(store.stats().hits, 1);
    }

    #[test]
    fn test_store_reconfigure_shrinks() {
        let mut store = CacheStore::new(3, TTL);
        let keys: Vec<CacheKey> = ["/a", "/b", "/c"].iter().map(|p| key("r", p)).collect();
        for k in &keys {
            store.set(k, payload("v"), None);
        }
        store.get(&keys[0].to_string());

        let evicted = store.reconfigure(1, TTL);

        assert_eq!(evicted, 2);
        assert!(store.contains(&keys[0].to_string()));
        assert_eq!(store.stats().max_size, 1);
    }

    #[test]
    fn test_store_reset_stats() {
        let mut store = CacheStore::new(10, TTL);
        store.get("missing");
        store.reset_stats();
        assert_eq!(store.stats().misses, 0);
    }
}
