//! Backend invocation subsystem.
//!
//! # Data Flow
//! ```text
//! BackendDescriptor + RequestParams + CallContext
//!     → http.rs (build upstream request, send with deadline)
//!     → LogicalResponse (status, headers, body stream, complete flag)
//!     → decorators / combiner
//! ```
//!
//! # Design Decisions
//! - Invokers never return `Err`: transport failures, timeouts and
//!   cancellation are recorded inside the `LogicalResponse`
//! - The body is moved, never cloned, so it can only be consumed once
//! - Dropping a response releases its connection

pub mod descriptor;
pub mod http;

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, StatusCode};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::proxy::params::RequestParams;

pub use descriptor::{BackendDescriptor, ClientSettings};
pub use http::HttpInvoker;

/// Why a backend call did not produce a usable response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("backend call timed out")]
    Timeout,
    #[error("backend call cancelled")]
    Cancelled,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid upstream request: {0}")]
    InvalidRequest(String),
    #[error("undecodable backend body: {0}")]
    Decode(String),
    #[error("backend body exceeds {0} bytes")]
    BodyTooLarge(usize),
}

/// Body of a backend or combined response.
#[derive(Debug, Default)]
pub enum Payload {
    /// Nothing to send.
    #[default]
    Empty,
    /// Unread byte stream, handed over as-is.
    Stream(Body),
    /// Decoded structured data.
    Data(serde_json::Value),
}

impl Payload {
    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }
}

/// Normalized result of one backend call.
#[derive(Debug)]
pub struct LogicalResponse {
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
    pub body: Payload,
    /// The backend answered without transport error.
    pub complete: bool,
    /// The status policy rejected the answer (application-level failure).
    pub failed: bool,
    pub error: Option<BackendError>,
}

impl LogicalResponse {
    /// A response received from the upstream.
    pub fn received(status: StatusCode, headers: HeaderMap, body: Body) -> Self {
        Self {
            status: Some(status),
            headers,
            body: Payload::Stream(body),
            complete: true,
            failed: false,
            error: None,
        }
    }

    /// A call that never produced a response.
    pub fn incomplete(error: BackendError) -> Self {
        Self {
            status: None,
            headers: HeaderMap::new(),
            body: Payload::Empty,
            complete: false,
            failed: true,
            error: Some(error),
        }
    }

    /// Completed and accepted by the status policy.
    pub fn is_success(&self) -> bool {
        self.complete && !self.failed
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.error, Some(BackendError::Timeout))
    }
}

/// Per-request context shared by every backend call of one request.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub request_id: String,
    /// Overall request deadline.
    pub deadline: Instant,
    pub cancel: CancellationToken,
}

impl CallContext {
    pub fn new(request_id: impl Into<String>, deadline: Instant) -> Self {
        Self {
            request_id: request_id.into(),
            deadline,
            cancel: CancellationToken::new(),
        }
    }

    /// Effective deadline for one call that starts now.
    ///
    /// A per-backend budget counts from the call start and never extends
    /// past the request deadline.
    pub fn call_deadline(&self, budget: Option<Duration>) -> Instant {
        match budget {
            Some(budget) => self.deadline.min(Instant::now() + budget),
            None => self.deadline,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// Executes one call against one upstream.
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(
        &self,
        ctx: &CallContext,
        backend: &BackendDescriptor,
        params: &RequestParams,
    ) -> LogicalResponse;
}
