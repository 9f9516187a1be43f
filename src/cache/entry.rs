//! Cache Entry Module
//!
//! A stored upstream response together with its lifecycle timestamps.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use crate::relay::HeaderBag;

// == Cached Response ==
/// Snapshot of an upstream response as relayed to the client (CORS headers excluded).
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: HeaderBag,
    pub body: Bytes,
}

// == Cache Entry ==
/// A single cache entry. All timestamps are Unix milliseconds.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    /// Route component of the key
    pub route: String,
    pub payload: CachedResponse,
    pub created_at: u64,
    /// Never before `created_at`
    pub expires_at: u64,
    pub last_accessed_at: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry stamped at `now` that lives for `ttl`.
    pub fn new(
        key: String,
        route: String,
        payload: CachedResponse,
        ttl: Duration,
        now: u64,
    ) -> Self {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);

        Self {
            key,
            route,
            payload,
            created_at: now,
            expires_at: now.saturating_add(ttl_ms),
            last_accessed_at: now,
        }
    }

    // == Is Expired ==
    /// An entry is expired once `now` reaches `expires_at`.
    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.expires_at
    }

    /// Remaining lifetime in milliseconds, 0 once expired.
    pub fn ttl_remaining_ms(&self, now: u64) -> u64 {
        self.expires_at.saturating_sub(now)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
