//! API gateway request core.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client request
//!       │
//!       ▼
//!   http::middleware  (CORS gate → authentication gate)
//!       │
//!       ▼
//!   http::handler     (one per endpoint: params → pipeline → renderer)
//!       │
//!       ▼
//!   proxy             (fan-out under the request deadline, then combine)
//!       │  ┌────────────────────────────────────────────┐
//!       ├─▶│ decorator chain → backend::HttpInvoker     │──▶ Backend A
//!       ├─▶│ decorator chain → backend::HttpInvoker     │──▶ Backend B
//!       │  └────────────────────────────────────────────┘
//!       ▼
//!   render            (json merge renderer / no-op verbatim renderer)
//!       │
//!       ▼
//!   Client response
//! ```
//!
//! Cross-cutting: `config` (TOML + validation), `observability` (tracing,
//! metrics), `resilience` (deadlines, retry), `lifecycle` (startup, signals).

// Core
pub mod backend;
pub mod decorator;
pub mod proxy;
pub mod render;
pub mod routing;

// Boundary
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::schema::GatewayConfig;
pub use http::{EndpointHandler, GatewayServer};
pub use lifecycle::Shutdown;
pub use render::RendererRegistry;
