//! HTTP boundary.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum router, tower layers)
//!     → request.rs (request ID assigned and echoed)
//!     → middleware/ (CORS gate, authentication gate)
//!     → handler.rs (pipeline + renderer of the matched endpoint)
//!     → response.rs (gateway-generated error responses)
//! ```

pub mod debug;
pub mod handler;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use handler::EndpointHandler;
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::GatewayServer;
