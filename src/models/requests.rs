//! Request DTOs for the admin API
//!
//! Defines the structure of incoming admin request bodies.

use serde::Deserialize;

/// Request body for `POST /admin/cache/invalidate`
///
/// # Fields
/// - `pattern`: regular expression (or literal text) matched against cache keys
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidatePatternRequest {
    pub pattern: String,
}

impl InvalidatePatternRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.pattern.trim().is_empty() {
            return Some("Pattern cannot be empty".to_string());
        }
        None
    }
}
