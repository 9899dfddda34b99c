//! Security helpers shared by the request and response paths.
//!
//! # Design Decisions
//! - Connection-level headers never cross the gateway in either direction
//! - Request gates (CORS, authentication) live in `http::middleware`

pub mod headers;
