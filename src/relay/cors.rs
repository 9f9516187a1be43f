//! Cross-origin response headers computed by the relay.

use axum::http::{header, HeaderMap, HeaderValue};

const ALLOWED_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, HEAD, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization, Accept, Origin, X-Requested-With";
const EXPOSED_HEADERS: &str = "X-Cache";
/// One day, in seconds
const MAX_AGE: &str = "86400";

// == CORS Policy ==
/// Decides `Access-Control-Allow-Origin` from the configured origins.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origins: Vec<String>,
    wildcard: bool,
}

impl CorsPolicy {
    pub fn new(allowed_origins: &[String]) -> Self {
        Self {
            wildcard: allowed_origins.iter().any(|o| o.trim() == "*"),
            origins: allowed_origins
                .iter()
                .map(|o| o.trim().trim_end_matches('/').to_string())
                .filter(|o| o != "*")
                .collect(),
        }
    }

    /// Value for `Access-Control-Allow-Origin`.
    ///
    /// Credentials are always allowed, so a literal `*` is never sent: an
    /// accepted origin is echoed back and anything else gets `null`.
    pub fn allow_origin(&self, origin: Option<&str>) -> String {
        match origin {
            Some(origin) if self.wildcard || self.origins.iter().any(|o| o == origin) => {
                origin.to_string()
            }
            _ => "null".to_string(),
        }
    }

    /// Writes the full set of CORS headers. Everything except the origin is
    /// constant, so preflight and actual responses are handled alike.
    pub fn apply(&self, headers: &mut HeaderMap, origin: Option<&str>) {
        let allow_origin = HeaderValue::from_str(&self.allow_origin(origin))
            .unwrap_or_else(|_| HeaderValue::from_static("null"));

        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(MAX_AGE));
        headers.insert(
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static(EXPOSED_HEADERS),
        );
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    }
}
