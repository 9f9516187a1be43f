//! API Routes
//!
//! Configures the Axum router with the relay and admin endpoints.

use axum::{
    routing::{any, delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, health_handler, invalidate_pattern_handler, invalidate_route_handler,
    relay_direct_handler, relay_route_handler, relay_route_root_handler, reset_stats_handler,
    stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `ANY /relay?url=<target>` - Relay to an absolute URL
/// - `ANY /relay/:route/*path` - Relay through a named route
/// - `GET /admin/cache/stats` - Cache statistics
/// - `POST /admin/cache/stats/reset` - Reset cache counters
/// - `DELETE /admin/cache` - Clear the cache
/// - `DELETE /admin/cache/routes/:route` - Invalidate one route
/// - `POST /admin/cache/invalidate` - Invalidate by key pattern
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: permissive layer on admin endpoints only; relay responses carry
///   headers computed from the configured origins
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let admin = Router::new()
        .route("/admin/cache", delete(clear_handler))
        .route("/admin/cache/stats", get(stats_handler))
        .route("/admin/cache/stats/reset", post(reset_stats_handler))
        .route("/admin/cache/routes/:route", delete(invalidate_route_handler))
        .route("/admin/cache/invalidate", post(invalidate_pattern_handler))
        .route("/health", get(health_handler))
        .layer(cors);

    Router::new()
        .route("/relay", any(relay_direct_handler))
        .route("/relay/:route", any(relay_route_root_handler))
        .route("/relay/:route/*path", any(relay_route_handler))
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
