//! Response Cache Service
//!
//! Shared, lock-guarded wrapper around `CacheStore`. One mutex covers both the
//! entry map and the recency index so LRU bookkeeping stays consistent across
//! concurrent reads and writes.

use std::time::Duration;

use regex::Regex;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::cache::{CacheEntry, CacheKey, CacheStats, CacheStore, CachedResponse};
use crate::config::CachePolicy;

// == Response Cache ==
#[derive(Debug)]
pub struct ResponseCache {
    store: Mutex<CacheStore>,
}

impl ResponseCache {
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            store: Mutex::new(CacheStore::new(max_entries, default_ttl)),
        }
    }

    pub fn from_policy(policy: &CachePolicy) -> Self {
        Self::new(policy.max_size, policy.default_ttl())
    }

    /// Live entry for `key`, if any.
    pub async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let rendered = key.to_string();
        let entry = self.store.lock().await.get(&rendered);
        debug!(key = %rendered, hit = entry.is_some(), "cache lookup");
        entry
    }

    /// Stores a response; `ttl_override` replaces the default TTL.
    pub async fn set(&self, key: &CacheKey, payload: CachedResponse, ttl_override: Option<Duration>) {
        self.store.lock().await.set(key, payload, ttl_override);
        debug!(key = %key, "cache store");
    }

    pub async fn invalidate_by_route(&self, route: &str) -> usize {
        let removed = self.store.lock().await.invalidate_route(route);
        if removed > 0 {
            info!(route, removed, "invalidated cached responses for route");
        }
        removed
    }

    /// Removes entries whose key matches `pattern`. A pattern that is not a
    /// valid regular expression is matched as a literal substring.
    pub async fn invalidate_by_pattern(&self, pattern: &str) -> usize {
        let regex = Regex::new(pattern).or_else(|_| Regex::new(&regex::escape(pattern)));
        let Ok(regex) = regex else {
            return 0;
        };

        let removed = self.store.lock().await.invalidate_matching(&regex);
        info!(pattern, removed, "invalidated cached responses by pattern");
        removed
    }

    pub async fn invalidate_expired(&self) -> usize {
        self.store.lock().await.invalidate_expired()
    }

    pub async fn clear(&self) -> usize {
        let removed = self.store.lock().await.clear();
        info!(removed, "cache cleared");
        removed
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.lock().await.stats()
    }

    pub async fn reset_stats(&self) {
        self.store.lock().await.reset_stats();
    }

    /// Applies a new capacity and default TTL, e.g. after a configuration reload.
    pub async fn reconfigure(&self, policy: &CachePolicy) -> usize {
        let evicted = self
            .store
            .lock()
            .await
            .reconfigure(policy.max_size, policy.default_ttl());
        info!(
            max_size = policy.max_size,
            default_ttl_ms = policy.default_ttl,
            evicted,
            "cache reconfigured"
        );
        evicted
    }
}
