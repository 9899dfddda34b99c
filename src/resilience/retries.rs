//! Retry decorator.
//!
//! # Responsibilities
//! - Determine if a backend result is retryable (idempotent methods only)
//! - Re-invoke the inner chain with exponential backoff + jitter
//! - Never sleep or retry past the call deadline
//!
//! # Design Decisions
//! - Never retry POST/PATCH (non-idempotent)
//! - Connection errors always retryable; only 502/503/504 among statuses
//! - Cancellation and timeouts end the loop immediately

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};

use crate::backend::{BackendDescriptor, BackendError, CallContext, Invoker, LogicalResponse};
use crate::config::schema::RetryConfig;
use crate::decorator::Decorator;
use crate::proxy::params::RequestParams;
use crate::resilience::backoff::Backoff;

/// Check if a request is retryable.
pub fn is_retryable(method: &Method, response: &LogicalResponse) -> bool {
    if !method.is_idempotent() {
        return false;
    }

    match &response.error {
        Some(BackendError::Transport(_)) => true,
        Some(_) => false,
        None => matches!(
            response.status,
            Some(StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT)
        ),
    }
}

/// Retry settings for one backend.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.base_delay_ms, self.max_delay_ms)
    }
}

impl Decorator for RetryPolicy {
    fn name(&self) -> &'static str {
        "retry"
    }

    fn decorate(&self, inner: Arc<dyn Invoker>) -> Arc<dyn Invoker> {
        Arc::new(RetryInvoker {
            policy: *self,
            inner,
        })
    }
}

struct RetryInvoker {
    policy: RetryPolicy,
    inner: Arc<dyn Invoker>,
}

#[async_trait]
impl Invoker for RetryInvoker {
    async fn invoke(
        &self,
        ctx: &CallContext,
        backend: &BackendDescriptor,
        params: &RequestParams,
    ) -> LogicalResponse {
        let backoff = self.policy.backoff();
        let mut attempts = 0;
        loop {
            attempts += 1;
            let response = self.inner.invoke(ctx, backend, params).await;

            if response.is_success()
                || attempts >= self.policy.max_attempts
                || !is_retryable(&backend.method, &response)
            {
                return response;
            }

            let Some(delay) = backoff.delay_within(attempts, ctx.remaining()) else {
                return response;
            };

            tracing::info!(
                request_id = %ctx.request_id,
                backend = %backend.name,
                attempt = attempts,
                delay = ?delay,
                "Retrying backend call"
            );
            // Release the failed attempt before waiting.
            drop(response);

            tokio::select! {
                _ = ctx.cancel.cancelled() => return LogicalResponse::incomplete(BackendError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::HeaderMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    struct Flaky {
        calls: AtomicU32,
        fail_first: u32,
    }

    #[async_trait]
    impl Invoker for Flaky {
        async fn invoke(
            &self,
            _ctx: &CallContext,
            _backend: &BackendDescriptor,
            _params: &RequestParams,
        ) -> LogicalResponse {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                LogicalResponse::incomplete(BackendError::Transport("connection refused".into()))
            } else {
                LogicalResponse::received(StatusCode::OK, HeaderMap::new(), Body::empty())
            }
        }
    }

    fn backend(method: &str) -> BackendDescriptor {
        BackendDescriptor::from_config(
            &toml::from_str(&format!(
                "host = \"http://127.0.0.1:1\"\nurl_pattern = \"/\"\nmethod = \"{}\"",
                method
            ))
            .unwrap(),
            0,
            &Default::default(),
        )
        .unwrap()
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 5,
            max_delay_ms: 20,
        }
    }

    #[tokio::test]
    async fn test_retries_transport_errors_until_success() {
        let flaky = Arc::new(Flaky { calls: AtomicU32::new(0), fail_first: 2 });
        let invoker = policy().decorate(flaky.clone());
        let ctx = CallContext::new("t", Instant::now() + Duration::from_secs(1));

        let r = invoker.invoke(&ctx, &backend("GET"), &RequestParams::default()).await;
        assert!(r.is_success());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_never_retries_post() {
        let flaky = Arc::new(Flaky { calls: AtomicU32::new(0), fail_first: 5 });
        let invoker = policy().decorate(flaky.clone());
        let ctx = CallContext::new("t", Instant::now() + Duration::from_secs(1));

        let r = invoker.invoke(&ctx, &backend("POST"), &RequestParams::default()).await;
        assert!(!r.is_success());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stops_before_deadline() {
        let flaky = Arc::new(Flaky { calls: AtomicU32::new(0), fail_first: 5 });
        let slow = RetryPolicy { max_attempts: 5, base_delay_ms: 500, max_delay_ms: 500 };
        let invoker = slow.decorate(flaky.clone());
        let ctx = CallContext::new("t", Instant::now() + Duration::from_millis(100));

        invoker.invoke(&ctx, &backend("GET"), &RequestParams::default()).await;
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_is_retryable() {
        let transport = LogicalResponse::incomplete(BackendError::Transport("reset".into()));
        let timeout = LogicalResponse::incomplete(BackendError::Timeout);
        let unavailable =
            LogicalResponse::received(StatusCode::SERVICE_UNAVAILABLE, HeaderMap::new(), Body::empty());
        let not_found = LogicalResponse::received(StatusCode::NOT_FOUND, HeaderMap::new(), Body::empty());

        assert!(is_retryable(&Method::GET, &transport));
        assert!(!is_retryable(&Method::GET, &timeout));
        assert!(is_retryable(&Method::GET, &unavailable));
        assert!(!is_retryable(&Method::GET, &not_found));
        assert!(!is_retryable(&Method::POST, &transport));
    }
}
