//! CORS Relay - forwards browser requests to upstream APIs
//!
//! Resolves a target (raw URL or named route), enforces the domain policy,
//! forwards with retries, caches successful GET responses and adds CORS headers.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod relay;
pub mod tasks;

pub use api::AppState;
pub use config::{Config, RelayConfig};
pub use error::{ConfigError, RelayError};
pub use relay::RelayController;
pub use tasks::spawn_cleanup_task;
