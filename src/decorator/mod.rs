//! Decorator chain.
//!
//! # Data Flow
//! ```text
//! Startup, once per backend:
//!     BackendConfig → stages_for() → [Logging, Retry?, BodyPolicy, StatusPolicy]
//!     → ChainBuilder::build(HttpInvoker) → Arc<dyn Invoker>
//!
//! Request time:
//!     Logging → Retry → BodyPolicy → StatusPolicy → HttpInvoker
//!     (the first stage observes the call first and the result last)
//! ```
//!
//! # Design Decisions
//! - Every stage implements the same `Invoker` contract as the base invoker
//! - Chains are folded once at startup and shared; stages hold no per-request state
//! - Stage order matters: the body policy must see the status policy's verdict

pub mod body;
pub mod logging;
pub mod status;

use std::sync::Arc;

use crate::backend::Invoker;
use crate::config::schema::{BackendConfig, SecurityConfig};
use crate::resilience::retries::RetryPolicy;

pub use body::{BodyPolicy, BodyShape, Encoding};
pub use logging::{InvocationStats, LoggingDecorator};
pub use status::{StatusPolicy, StatusRange, StatusRangeError};

/// Wraps an invoker to add one cross-cutting behavior.
pub trait Decorator: Send + Sync {
    fn name(&self) -> &'static str;

    fn decorate(&self, inner: Arc<dyn Invoker>) -> Arc<dyn Invoker>;
}

/// One capability in a backend's chain.
#[derive(Clone)]
pub enum Stage {
    Logging(LoggingDecorator),
    Retry(RetryPolicy),
    Body(BodyPolicy),
    Status(StatusPolicy),
    /// Caller-provided decoration.
    Custom(Arc<dyn Decorator>),
}

impl Decorator for Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::Logging(d) => d.name(),
            Stage::Retry(d) => d.name(),
            Stage::Body(d) => d.name(),
            Stage::Status(d) => d.name(),
            Stage::Custom(d) => d.name(),
        }
    }

    fn decorate(&self, inner: Arc<dyn Invoker>) -> Arc<dyn Invoker> {
        match self {
            Stage::Logging(d) => d.decorate(inner),
            Stage::Retry(d) => d.decorate(inner),
            Stage::Body(d) => d.decorate(inner),
            Stage::Status(d) => d.decorate(inner),
            Stage::Custom(d) => d.decorate(inner),
        }
    }
}

/// Ordered list of stages, outermost first.
#[derive(Clone, Default)]
pub struct ChainBuilder {
    stages: Vec<Stage>,
}

impl ChainBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage inside the ones already added.
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Fold the stages around `base`. The first stage ends up outermost.
    pub fn build(self, base: Arc<dyn Invoker>) -> Arc<dyn Invoker> {
        self.stages
            .into_iter()
            .rev()
            .fold(base, |inner, stage| stage.decorate(inner))
    }
}

/// The configured chain for one backend.
///
/// Backends of a pass-through endpoint always get the opaque body policy,
/// whatever `encoding` says: their bytes are relayed, never re-encoded.
pub fn stages_for(
    config: &BackendConfig,
    pass_through: bool,
    security: &SecurityConfig,
    stats: Arc<InvocationStats>,
) -> Result<ChainBuilder, StatusRangeError> {
    let mut chain = ChainBuilder::new().stage(Stage::Logging(LoggingDecorator::new(stats)));

    if let Some(retry) = &config.retry {
        chain = chain.stage(Stage::Retry(RetryPolicy::from_config(retry)));
    }

    let mut body = BodyPolicy::from_config(config, security.max_body_size);
    if pass_through && body.encoding() != Encoding::NoOp {
        tracing::debug!(
            host = %config.host,
            encoding = ?body.encoding(),
            "Pass-through backend body left undecoded"
        );
        body = body.with_encoding(Encoding::NoOp);
    }

    Ok(chain
        .stage(Stage::Body(body))
        .stage(Stage::Status(StatusPolicy::parse(&config.accept_status)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendDescriptor, CallContext, LogicalResponse};
    use crate::proxy::params::RequestParams;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Records enter/exit order into a shared log.
    struct Trace {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        inner: Option<Arc<dyn Invoker>>,
    }

    #[async_trait]
    impl Invoker for Trace {
        async fn invoke(
            &self,
            ctx: &CallContext,
            backend: &BackendDescriptor,
            params: &RequestParams,
        ) -> LogicalResponse {
            self.log.lock().unwrap().push(format!("enter {}", self.label));
            let response = match &self.inner {
                Some(inner) => inner.invoke(ctx, backend, params).await,
                None => LogicalResponse::incomplete(crate::backend::BackendError::Cancelled),
            };
            self.log.lock().unwrap().push(format!("exit {}", self.label));
            response
        }
    }

    struct TraceStage {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Decorator for TraceStage {
        fn name(&self) -> &'static str {
            self.label
        }

        fn decorate(&self, inner: Arc<dyn Invoker>) -> Arc<dyn Invoker> {
            Arc::new(Trace {
                label: self.label,
                log: self.log.clone(),
                inner: Some(inner),
            })
        }
    }

    #[tokio::test]
    async fn test_fold_order_outermost_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stage = |label| {
            Stage::Custom(Arc::new(TraceStage {
                label,
                log: log.clone(),
            }))
        };

        let base: Arc<dyn Invoker> = Arc::new(Trace {
            label: "base",
            log: log.clone(),
            inner: None,
        });

        let builder = ChainBuilder::new().stage(stage("outer")).stage(stage("inner"));
        assert_eq!(builder.stage_names(), vec!["outer", "inner"]);
        let chain = builder.build(base);

        let backend = BackendDescriptor::from_config(
            &toml::from_str("host = \"http://127.0.0.1:1\"\nurl_pattern = \"/\"").unwrap(),
            0,
            &Default::default(),
        )
        .unwrap();
        let ctx = CallContext::new("t", Instant::now() + Duration::from_secs(1));
        chain.invoke(&ctx, &backend, &RequestParams::default()).await;

        let log = log.lock().unwrap().clone();
        assert_eq!(
            log,
            vec![
                "enter outer", "enter inner", "enter base", "exit base", "exit inner", "exit outer"
            ]
        );
    }

    #[test]
    fn test_stages_for_default_order() {
        let config: BackendConfig =
            toml::from_str("host = \"http://127.0.0.1:1\"\nurl_pattern = \"/\"").unwrap();
        let chain = stages_for(&config, false, &SecurityConfig::default(), Arc::new(InvocationStats::default()))
            .unwrap();
        assert_eq!(chain.stage_names(), vec!["logging", "body-policy", "status-policy"]);

        let config: BackendConfig = toml::from_str(
            "host = \"http://127.0.0.1:1\"\nurl_pattern = \"/\"\n[retry]\nmax_attempts = 2",
        )
        .unwrap();
        let chain = stages_for(&config, false, &SecurityConfig::default(), Arc::new(InvocationStats::default()))
            .unwrap();
        assert_eq!(
            chain.stage_names(),
            vec!["logging", "retry", "body-policy", "status-policy"]
        );
    }

    fn body_encoding(chain: &ChainBuilder) -> Option<Encoding> {
        chain.stages.iter().find_map(|stage| match stage {
            Stage::Body(policy) => Some(policy.encoding()),
            _ => None,
        })
    }

    #[test]
    fn test_pass_through_forces_opaque_body() {
        let config: BackendConfig =
            toml::from_str("host = \"http://127.0.0.1:1\"\nurl_pattern = \"/\"").unwrap();
        let stats = Arc::new(InvocationStats::default());

        let merged = stages_for(&config, false, &SecurityConfig::default(), stats.clone()).unwrap();
        assert_eq!(body_encoding(&merged), Some(Encoding::Json));

        let relayed = stages_for(&config, true, &SecurityConfig::default(), stats).unwrap();
        assert_eq!(body_encoding(&relayed), Some(Encoding::NoOp));
    }
}
