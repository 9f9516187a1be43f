//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing admin response bodies.

use serde::Serialize;

use crate::cache::CacheStats;

/// Response body for `GET /admin/cache/stats`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Current number of cached responses
    pub size: usize,
    pub max_size: usize,
    /// hits / (hits + misses)
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            size: stats.size,
            max_size: stats.max_size,
        }
    }
}

/// Response body for every cache removal operation
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub message: String,
    /// Number of entries removed
    pub removed: usize,
}

impl InvalidateResponse {
    pub fn cleared(removed: usize) -> Self {
        Self {
            message: "Cache cleared".to_string(),
            removed,
        }
    }

    pub fn route(route: &str, removed: usize) -> Self {
        Self {
            message: format!("Cache invalidated for route '{}'", route),
            removed,
        }
    }

    pub fn pattern(pattern: &str, removed: usize) -> Self {
        Self {
            message: format!("Cache invalidated for pattern '{}'", pattern),
            removed,
        }
    }
}

/// Response body for `POST /admin/cache/stats/reset`
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
