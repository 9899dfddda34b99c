//! Routing helpers.
//!
//! # Data Flow
//! ```text
//! Endpoint path template ("/users/{id}")
//!     → template.rs (parse at startup)
//!     → captures(incoming path) → parameters
//!     → backend template render(parameters) → upstream path
//! ```
//!
//! # Design Decisions
//! - Dispatch itself belongs to the HTTP router; this module only extracts
//!   and substitutes parameters
//! - Templates compiled at startup, immutable at runtime

pub mod template;

pub use template::{PathTemplate, TemplateError};
