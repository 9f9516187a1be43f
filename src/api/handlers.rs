//! API Handlers
//!
//! HTTP handlers for the relay surface, the admin cache operations and health.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{HeaderMap, Method},
    response::Response,
    Json,
};
use url::form_urlencoded;

use crate::config::RelayConfig;
use crate::error::{ConfigError, RelayError, Result};
use crate::models::{
    HealthResponse, InvalidatePatternRequest, InvalidateResponse, MessageResponse, StatsResponse,
};
use crate::relay::{RelayController, RelayRequest, RelayTarget};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<RelayController>,
}

impl AppState {
    pub fn new(relay: RelayController) -> Self {
        Self {
            relay: Arc::new(relay),
        }
    }

    /// Builds the relay (and its cache) from a configuration document.
    pub fn from_config(config: RelayConfig) -> std::result::Result<Self, ConfigError> {
        Ok(Self::new(RelayController::new(config)?))
    }

    /// Swaps in a new configuration; in-flight requests keep the old one.
    pub async fn reload(&self, config: RelayConfig) -> std::result::Result<(), ConfigError> {
        self.relay.reload(config).await
    }
}

// == Relay Handlers ==

/// Handler for `ANY /relay?url=<absolute-url>`
pub async fn relay_direct_handler(
    State(state): State<AppState>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let target = RelayTarget::from_query(&parse_query(query));
    relay(&state, method, target, headers, body).await
}

/// Handler for `ANY /relay/:route`
pub async fn relay_route_root_handler(
    State(state): State<AppState>,
    Path(route): Path<String>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let target = RelayTarget::Named {
        route,
        path: "/".to_string(),
        query: parse_query(query),
    };
    relay(&state, method, Ok(target), headers, body).await
}

/// Handler for `ANY /relay/:route/*path`
pub async fn relay_route_handler(
    State(state): State<AppState>,
    Path((route, path)): Path<(String, String)>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let target = RelayTarget::Named {
        route,
        path,
        query: parse_query(query),
    };
    relay(&state, method, Ok(target), headers, body).await
}

async fn relay(
    state: &AppState,
    method: Method,
    target: Result<RelayTarget>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state
        .relay
        .handle(RelayRequest {
            method,
            target,
            headers,
            body,
        })
        .await
}

fn parse_query(raw: Option<String>) -> Vec<(String, String)> {
    raw.map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

// == Admin Handlers ==

/// Handler for `GET /admin/cache/stats`
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.relay.cache_stats().await.into())
}

/// Handler for `POST /admin/cache/stats/reset`
pub async fn reset_stats_handler(State(state): State<AppState>) -> Json<MessageResponse> {
    state.relay.reset_cache_stats().await;
    Json(MessageResponse::new("Cache statistics reset"))
}

/// Handler for `DELETE /admin/cache`
pub async fn clear_handler(State(state): State<AppState>) -> Json<InvalidateResponse> {
    let removed = state.relay.clear_cache().await;
    Json(InvalidateResponse::cleared(removed))
}

/// Handler for `DELETE /admin/cache/routes/:route`
pub async fn invalidate_route_handler(
    State(state): State<AppState>,
    Path(route): Path<String>,
) -> Json<InvalidateResponse> {
    let removed = state.relay.invalidate_route(&route).await;
    Json(InvalidateResponse::route(&route, removed))
}

/// Handler for `POST /admin/cache/invalidate`
pub async fn invalidate_pattern_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidatePatternRequest>,
) -> Result<Json<InvalidateResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(RelayError::InvalidRequest(error_msg));
    }

    let removed = state.relay.invalidate_pattern(&req.pattern).await?;
    Ok(Json(InvalidateResponse::pattern(&req.pattern, removed)))
}

/// Handler for `GET /health`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
