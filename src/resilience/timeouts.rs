//! Request deadline derivation.
//!
//! # Responsibilities
//! - Derive the overall deadline of one request
//! - Let a caller shorten, never extend, the endpoint deadline
//!
//! # Design Decisions
//! - The request deadline is the single source of cancellation
//! - A zero hint is ignored rather than failing every backend instantly

use std::time::Duration;

use tokio::time::Instant;

/// Effective budget for one request.
pub fn request_budget(endpoint_timeout: Duration, hint: Option<Duration>) -> Duration {
    match hint {
        Some(hint) if !hint.is_zero() => endpoint_timeout.min(hint),
        _ => endpoint_timeout,
    }
}

/// Deadline for a request starting now.
pub fn request_deadline(endpoint_timeout: Duration, hint: Option<Duration>) -> Instant {
    Instant::now() + request_budget(endpoint_timeout, hint)
}
