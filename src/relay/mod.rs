//! Relay Module
//!
//! Resolves a client request to an upstream target, checks it against the
//! domain policy, forwards it with retries and computes the CORS headers of
//! the response.

mod auth;
mod controller;
mod cors;
mod domain;
mod forwarder;
mod headers;
mod route;

pub use auth::ProxyAuth;
pub use controller::{RelayController, RelayRequest, RelaySnapshot, X_CACHE};
pub use cors::CorsPolicy;
pub use domain::DomainPolicy;
pub use forwarder::{
    is_retryable_status, AttemptOutcome, OutboundRequest, RequestForwarder, RetryPolicy,
    UpstreamFailure, UpstreamResponse,
};
pub use headers::{filter_inbound, filter_outbound, HeaderBag};
pub use route::{CompiledRoute, RelayTarget, ResolvedTarget, RouteTable};
