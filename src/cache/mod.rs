//! Cache Module
//!
//! Bounded response cache with TTL expiration, LRU eviction and route/pattern
//! invalidation.

mod entry;
mod key;
mod lru;
mod service;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry, CachedResponse};
pub use key::CacheKey;
pub use lru::LruTracker;
pub use service::ResponseCache;
pub use stats::CacheStats;
pub use store::CacheStore;
