//! Status-policy decorator.
//!
//! Maps the upstream status code onto the `failed` flag of the response.
//! Which codes count as success is configured per backend as a list of
//! ranges (`"200-299"`, `"404"`); the status code itself is never altered.

use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::{BackendDescriptor, CallContext, Invoker, LogicalResponse};
use crate::decorator::Decorator;
use crate::proxy::params::RequestParams;

/// Inclusive range of status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRange {
    pub start: u16,
    pub end: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid status range '{0}'")]
pub struct StatusRangeError(pub String);

impl StatusRange {
    pub fn parse(raw: &str) -> Result<Self, StatusRangeError> {
        let err = || StatusRangeError(raw.to_string());
        let code = |s: &str| -> Result<u16, StatusRangeError> {
            let c = s.trim().parse::<u16>().map_err(|_| err())?;
            if (100..=999).contains(&c) {
                Ok(c)
            } else {
                Err(err())
            }
        };

        let (start, end) = match raw.split_once('-') {
            Some((a, b)) => (code(a)?, code(b)?),
            None => {
                let c = code(raw)?;
                (c, c)
            }
        };

        if start > end {
            return Err(err());
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, status: u16) -> bool {
        (self.start..=self.end).contains(&status)
    }
}

/// Decides which upstream statuses are application-level successes.
#[derive(Debug, Clone)]
pub struct StatusPolicy {
    accept: Arc<[StatusRange]>,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            accept: Arc::from([StatusRange { start: 200, end: 299 }]),
        }
    }
}

impl StatusPolicy {
    pub fn parse(ranges: &[String]) -> Result<Self, StatusRangeError> {
        let accept = ranges
            .iter()
            .map(|r| StatusRange::parse(r))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            accept: accept.into(),
        })
    }

    pub fn accepts(&self, status: u16) -> bool {
        self.accept.iter().any(|r| r.contains(status))
    }
}

impl Decorator for StatusPolicy {
    fn name(&self) -> &'static str {
        "status-policy"
    }

    fn decorate(&self, inner: Arc<dyn Invoker>) -> Arc<dyn Invoker> {
        Arc::new(StatusPolicyInvoker {
            policy: self.clone(),
            inner,
        })
    }
}

struct StatusPolicyInvoker {
    policy: StatusPolicy,
    inner: Arc<dyn Invoker>,
}

#[async_trait]
impl Invoker for StatusPolicyInvoker {
    async fn invoke(
        &self,
        ctx: &CallContext,
        backend: &BackendDescriptor,
        params: &RequestParams,
    ) -> LogicalResponse {
        let mut response = self.inner.invoke(ctx, backend, params).await;
        if let (true, Some(status)) = (response.complete, response.status) {
            response.failed = !self.policy.accepts(status.as_u16());
        }
        response
    }
}
