//! Proxy pipeline.
//!
//! # Data Flow
//! ```text
//! RequestParams
//!     → timeouts::request_deadline() (endpoint timeout, caller hint)
//!     → one task per backend, all sharing one CancellationToken
//!     → join under the deadline; on expiry cancel + abort the rest
//!     → combine.rs (merge or pass-through)
//!     → CombinedResponse
//! ```
//!
//! # Design Decisions
//! - The pipeline never retries
//! - Completion order is irrelevant: results are slotted by declaration index
//! - Every spawned task is joined or aborted before `run` returns
//! - Dropping the `run` future cancels all in-flight calls

pub mod combine;
pub mod endpoint;
pub mod params;

use std::sync::Arc;

use tokio::task::JoinSet;

use crate::backend::{BackendError, CallContext, Invoker, LogicalResponse};
use crate::resilience::timeouts;

pub use combine::{combine, CombinedResponse};
pub use endpoint::{CombinePolicy, EndpointDefinition, EndpointError, ForwardList};
pub use params::{ParamsError, RequestParams};

#[derive(Debug, thiserror::Error)]
#[error("endpoint {path}: {expected} backends but {found} invokers")]
pub struct PipelineError {
    pub path: String,
    pub expected: usize,
    pub found: usize,
}

/// Fan-out and combination for one endpoint.
pub struct ProxyPipeline {
    endpoint: Arc<EndpointDefinition>,
    /// Finalized invoker per backend, in declaration order.
    invokers: Vec<Arc<dyn Invoker>>,
}

impl ProxyPipeline {
    pub fn new(
        endpoint: Arc<EndpointDefinition>,
        invokers: Vec<Arc<dyn Invoker>>,
    ) -> Result<Self, PipelineError> {
        if invokers.len() != endpoint.backends.len() {
            return Err(PipelineError {
                path: endpoint.path.to_string(),
                expected: endpoint.backends.len(),
                found: invokers.len(),
            });
        }
        Ok(Self { endpoint, invokers })
    }

    pub fn endpoint(&self) -> &EndpointDefinition {
        &self.endpoint
    }

    /// Call every backend concurrently and combine the results.
    pub async fn run(&self, params: RequestParams) -> CombinedResponse {
        let deadline = timeouts::request_deadline(self.endpoint.timeout, params.timeout_hint);
        let ctx = CallContext::new(params.request_id.clone(), deadline);
        let _cancel_on_exit = ctx.cancel.clone().drop_guard();
        let params = Arc::new(params);

        let mut tasks = JoinSet::new();
        for (index, (backend, invoker)) in self
            .endpoint
            .backends
            .iter()
            .zip(self.invokers.iter())
            .enumerate()
        {
            let ctx = ctx.clone();
            let backend = backend.clone();
            let invoker = invoker.clone();
            let params = params.clone();

            tasks.spawn(async move {
                let response = tokio::select! {
                    biased;
                    _ = ctx.cancel.cancelled() => LogicalResponse::incomplete(BackendError::Cancelled),
                    response = invoker.invoke(&ctx, &backend, &params) => response,
                };
                (index, response)
            });
        }

        let mut results: Vec<Option<LogicalResponse>> =
            self.endpoint.backends.iter().map(|_| None).collect();
        let mut timed_out = false;

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((index, response)))) => results[index] = Some(response),
                Ok(Some(Err(e))) => {
                    tracing::error!(
                        request_id = %ctx.request_id,
                        endpoint = %self.endpoint.path,
                        error = %e,
                        "Backend task aborted"
                    );
                }
                Ok(None) => break,
                Err(_) => {
                    timed_out = true;
                    tracing::warn!(
                        request_id = %ctx.request_id,
                        endpoint = %self.endpoint.path,
                        pending = tasks.len(),
                        "Request deadline elapsed, cancelling backend calls"
                    );
                    ctx.cancel.cancel();
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                    break;
                }
            }
        }

        let results = results
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    LogicalResponse::incomplete(if timed_out {
                        BackendError::Timeout
                    } else {
                        BackendError::Transport("backend task failed".to_string())
                    })
                })
            })
            .collect();

        let combined = combine(self.endpoint.policy, &self.endpoint.backends, results);

        tracing::debug!(
            request_id = %ctx.request_id,
            endpoint = %self.endpoint.path,
            status = combined.status.as_u16(),
            complete = combined.complete,
            "Backends combined"
        );

        combined
    }
}
