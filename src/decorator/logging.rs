//! Logging decorator.
//!
//! # Responsibilities
//! - Log method, upstream, elapsed time and outcome of every backend call
//! - Count invocations for metrics and in-process stats
//!
//! # Design Decisions
//! - Side effects only: the response, including its body stream, passes through untouched
//! - Counters are atomics; safe under concurrent increments from any number of requests

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::backend::{BackendDescriptor, CallContext, Invoker, LogicalResponse};
use crate::decorator::Decorator;
use crate::observability::metrics;
use crate::proxy::params::RequestParams;

/// Process-wide backend call counters.
#[derive(Debug, Default)]
pub struct InvocationStats {
    invocations: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
}

impl InvocationStats {
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn timed_out(&self) -> u64 {
        self.timed_out.load(Ordering::Relaxed)
    }

    fn record(&self, response: &LogicalResponse) {
        if response.is_success() {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        if response.is_timeout() {
            self.timed_out.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Logs each call made through the wrapped invoker.
#[derive(Debug, Clone)]
pub struct LoggingDecorator {
    stats: Arc<InvocationStats>,
}

impl LoggingDecorator {
    pub fn new(stats: Arc<InvocationStats>) -> Self {
        Self { stats }
    }
}

impl Decorator for LoggingDecorator {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn decorate(&self, inner: Arc<dyn Invoker>) -> Arc<dyn Invoker> {
        Arc::new(LoggingInvoker {
            stats: self.stats.clone(),
            inner,
        })
    }
}

struct LoggingInvoker {
    stats: Arc<InvocationStats>,
    inner: Arc<dyn Invoker>,
}

#[async_trait]
impl Invoker for LoggingInvoker {
    async fn invoke(
        &self,
        ctx: &CallContext,
        backend: &BackendDescriptor,
        params: &RequestParams,
    ) -> LogicalResponse {
        self.stats.invocations.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();

        tracing::debug!(
            request_id = %ctx.request_id,
            backend = %backend.name,
            method = %backend.method,
            upstream = %backend.host,
            "Calling backend"
        );

        let response = self.inner.invoke(ctx, backend, params).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        self.stats.record(&response);

        let outcome = match (&response.error, response.failed) {
            (Some(_), _) => "error",
            (None, true) => "rejected",
            (None, false) => "ok",
        };
        metrics::record_backend_call(&backend.name, outcome, start);

        match (&response.error, response.status) {
            (Some(error), _) => tracing::warn!(
                request_id = %ctx.request_id,
                backend = %backend.name,
                method = %backend.method,
                upstream = %backend.host,
                elapsed_ms,
                error = %error,
                "Backend call failed"
            ),
            (None, Some(status)) => tracing::info!(
                request_id = %ctx.request_id,
                backend = %backend.name,
                method = %backend.method,
                upstream = %backend.host,
                elapsed_ms,
                status = status.as_u16(),
                accepted = !response.failed,
                "Backend call finished"
            ),
            (None, None) => {}
        }

        response
    }
}
