//! API Module
//!
//! HTTP handlers and routing for the relay and its admin surface.
//!
//! # Endpoints
//! - `ANY /relay?url=<target>` - Relay to an absolute URL
//! - `ANY /relay/:route/*path` - Relay through a named route
//! - `/admin/cache/...` - Cache statistics and invalidation
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
