//! Error types for the relay
//!
//! Provides unified error handling using thiserror. Every relay failure is
//! rendered as the stable envelope `{ "error": { code, message, timestamp, suggestions? } }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Relay Error Enum ==
/// Unified error type for the relay surface.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Neither a `url` query parameter nor a named route was supplied
    #[error("No target URL specified")]
    NoTargetSpecified,

    /// The target could not be resolved (unparseable URL, unknown route)
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// The target resolved but the domain policy rejects it
    #[error("Target not allowed: {0}")]
    DisallowedTarget(String),

    /// Every attempt ran into the per-attempt timeout
    #[error("Upstream timed out after {attempts} attempt(s)")]
    UpstreamTimeout { attempts: u32 },

    /// The upstream could not be reached (refused, DNS, reset, other transport error)
    #[error("Upstream unreachable after {attempts} attempt(s): {reason}")]
    UpstreamUnreachable { attempts: u32, reason: String },

    /// Invalid administrative input
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl RelayError {
    // == Code ==
    /// Stable error code carried in the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::NoTargetSpecified => "NoTargetSpecified",
            RelayError::InvalidTarget(_) | RelayError::DisallowedTarget(_) => {
                "InvalidOrDisallowedTargetUrl"
            }
            RelayError::UpstreamTimeout { .. } => "UpstreamTimeout",
            RelayError::UpstreamUnreachable { .. } => "UpstreamUnreachable",
            RelayError::InvalidRequest(_) => "InvalidRequest",
        }
    }

    // == Status ==
    /// HTTP status used when rendering this error.
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::NoTargetSpecified
            | RelayError::InvalidTarget(_)
            | RelayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::DisallowedTarget(_) => StatusCode::FORBIDDEN,
            RelayError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            RelayError::UpstreamUnreachable { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    // == Suggestions ==
    /// Actionable hints for the caller.
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            RelayError::NoTargetSpecified => vec![
                "Pass the target as ?url=<absolute-url>",
                "Or use /relay/<routeName>/<path> with a configured route",
            ],
            RelayError::InvalidTarget(_) => vec![
                "Use an absolute http:// or https:// URL",
                "Check that the route name is configured",
            ],
            RelayError::DisallowedTarget(_) => vec![
                "Check the allow-list and block-list for this host",
                "Only http and https targets are relayed",
            ],
            RelayError::UpstreamTimeout { .. } => vec![
                "Increase the relay timeout",
                "Verify the target responds within the configured window",
            ],
            RelayError::UpstreamUnreachable { .. } => vec![
                "Verify the target is reachable from the relay host",
                "Check the target hostname and port",
            ],
            RelayError::InvalidRequest(_) => Vec::new(),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let suggestions = self.suggestions();

        let mut error = json!({
            "code": self.code(),
            "message": self.to_string(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        if !suggestions.is_empty() {
            error["suggestions"] = json!(suggestions);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

// == Config Error Enum ==
/// Errors raised while loading or validating the relay configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid route '{route}': {reason}")]
    InvalidRoute { route: String, reason: String },

    #[error("Failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),
}

// == Result Type Alias ==
/// Convenience Result type for the relay.
pub type Result<T> = std::result::Result<T, RelayError>;
