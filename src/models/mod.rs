//! Request and Response models for the admin API
//!
//! DTOs used for serializing/deserializing admin request and response bodies.
//! Relay responses are the upstream's own and have no DTO.

pub mod requests;
pub mod responses;

pub use requests::InvalidatePatternRequest;
pub use responses::{HealthResponse, InvalidateResponse, MessageResponse, StatsResponse};
