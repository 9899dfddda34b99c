//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → timeouts.rs (derive the request deadline)
//! Backend call (optional retry stage in the decorator chain):
//!     → retries.rs (retryable? budget left before the deadline?)
//!     → backoff.rs (jittered delay)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every backend call has a deadline
//! - The pipeline never retries; retry is a per-backend decorator
//! - Retries only for idempotent requests (GET, HEAD, etc.)

pub mod backoff;
pub mod retries;
pub mod timeouts;
