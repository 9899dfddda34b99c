//! Body-policy decorator.
//!
//! # Responsibilities
//! - Decode accepted backend bodies into structured data for merging
//! - Leave bodies as opaque streams for pass-through backends
//! - Release bodies of failed responses without reading them
//! - Shape decoded data (target, allow, deny, mapping)
//!
//! # Design Decisions
//! - Decoding is bounded by a size limit and by the request deadline
//! - Decode failures mark the response failed; the raw error only reaches logs

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::backend::{BackendDescriptor, BackendError, CallContext, Invoker, LogicalResponse, Payload};
use crate::config::schema::{BackendConfig, EncodingKind};
use crate::decorator::Decorator;
use crate::proxy::params::RequestParams;

/// How a backend body is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Json,
    /// Raw text, wrapped as `{"content": "..."}`.
    String,
    /// Not decoded; streamed through as-is.
    NoOp,
}

impl From<EncodingKind> for Encoding {
    fn from(kind: EncodingKind) -> Self {
        match kind {
            EncodingKind::Json => Encoding::Json,
            EncodingKind::String => Encoding::String,
            EncodingKind::NoOp => Encoding::NoOp,
        }
    }
}

/// Post-decode transformations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyShape {
    pub target: Option<String>,
    pub allow: Vec<String>,
    pub deny: Vec<String>,
    pub mapping: BTreeMap<String, String>,
}

impl BodyShape {
    pub fn apply(&self, value: Value) -> Value {
        let value = match &self.target {
            Some(target) => match value {
                Value::Object(mut map) => map.remove(target).unwrap_or(Value::Null),
                _ => Value::Null,
            },
            None => value,
        };

        let map = match value {
            Value::Object(map) => map,
            other => return other,
        };

        let shaped: Map<String, Value> = map
            .into_iter()
            .filter(|(k, _)| self.allow.is_empty() || self.allow.contains(k))
            .filter(|(k, _)| !self.deny.contains(k))
            .map(|(k, v)| match self.mapping.get(&k) {
                Some(renamed) => (renamed.clone(), v),
                None => (k, v),
            })
            .collect();

        Value::Object(shaped)
    }
}

/// Whether and how a backend body is parsed.
#[derive(Debug, Clone)]
pub struct BodyPolicy {
    encoding: Encoding,
    shape: Arc<BodyShape>,
    max_size: usize,
}

impl BodyPolicy {
    pub fn new(encoding: Encoding, shape: BodyShape, max_size: usize) -> Self {
        Self {
            encoding,
            shape: Arc::new(shape),
            max_size,
        }
    }

    pub fn from_config(config: &BackendConfig, max_size: usize) -> Self {
        Self::new(
            config.encoding.into(),
            BodyShape {
                target: config.target.clone(),
                allow: config.allow.clone(),
                deny: config.deny.clone(),
                mapping: config.mapping.clone(),
            },
            max_size,
        )
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, BackendError> {
        let value = match self.encoding {
            Encoding::Json => {
                if bytes.is_empty() {
                    Value::Object(Map::new())
                } else {
                    serde_json::from_slice(bytes).map_err(|e| BackendError::Decode(e.to_string()))?
                }
            }
            Encoding::String => {
                let text = String::from_utf8(bytes.to_vec())
                    .map_err(|e| BackendError::Decode(e.to_string()))?;
                let mut map = Map::new();
                map.insert("content".to_string(), Value::String(text));
                Value::Object(map)
            }
            Encoding::NoOp => return Err(BackendError::Decode("opaque body".to_string())),
        };
        Ok(self.shape.apply(value))
    }
}

impl Decorator for BodyPolicy {
    fn name(&self) -> &'static str {
        "body-policy"
    }

    fn decorate(&self, inner: Arc<dyn Invoker>) -> Arc<dyn Invoker> {
        Arc::new(BodyPolicyInvoker {
            policy: self.clone(),
            inner,
        })
    }
}

struct BodyPolicyInvoker {
    policy: BodyPolicy,
    inner: Arc<dyn Invoker>,
}

#[async_trait]
impl Invoker for BodyPolicyInvoker {
    async fn invoke(
        &self,
        ctx: &CallContext,
        backend: &BackendDescriptor,
        params: &RequestParams,
    ) -> LogicalResponse {
        let mut response = self.inner.invoke(ctx, backend, params).await;

        if self.policy.encoding == Encoding::NoOp {
            return response;
        }

        let body = std::mem::take(&mut response.body);
        if !response.is_success() {
            // Released unread.
            drop(body);
            return response;
        }

        let stream = match body {
            Payload::Stream(stream) => stream,
            other => {
                response.body = other;
                return response;
            }
        };

        let read = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(BackendError::Cancelled),
            read = tokio::time::timeout_at(
                ctx.call_deadline(backend.timeout),
                axum::body::to_bytes(stream, self.policy.max_size),
            ) => match read {
                Err(_) => Err(BackendError::Timeout),
                Ok(Err(_)) => Err(BackendError::BodyTooLarge(self.policy.max_size)),
                Ok(Ok(bytes)) => self.policy.decode(&bytes),
            },
        };

        match read {
            Ok(value) => response.body = Payload::Data(value),
            Err(error) => {
                // The head arrived but the body did not make it.
                response.complete = !matches!(error, BackendError::Timeout | BackendError::Cancelled);
                response.failed = true;
                response.error = Some(error);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{HeaderMap, StatusCode};
    use serde_json::json;
    use std::time::Duration;

    struct Fixed {
        status: StatusCode,
        body: &'static str,
        failed: bool,
    }

    #[async_trait]
    impl Invoker for Fixed {
        async fn invoke(
            &self,
            _ctx: &CallContext,
            _backend: &BackendDescriptor,
            _params: &RequestParams,
        ) -> LogicalResponse {
            let mut r = LogicalResponse::received(self.status, HeaderMap::new(), Body::from(self.body));
            r.failed = self.failed;
            r
        }
    }

    fn backend() -> BackendDescriptor {
        BackendDescriptor::from_config(
            &toml::from_str("host = \"http://127.0.0.1:1\"\nurl_pattern = \"/\"").unwrap(),
            0,
            &Default::default(),
        )
        .unwrap()
    }

    async fn run(policy: BodyPolicy, inner: Fixed) -> LogicalResponse {
        let ctx = CallContext::new("t", tokio::time::Instant::now() + Duration::from_secs(1));
        policy
            .decorate(Arc::new(inner))
            .invoke(&ctx, &backend(), &RequestParams::default())
            .await
    }

    #[tokio::test]
    async fn test_decodes_json() {
        let policy = BodyPolicy::new(Encoding::Json, BodyShape::default(), 1024);
        let r = run(policy, Fixed { status: StatusCode::OK, body: r#"{"a":1}"#, failed: false }).await;
        match r.body {
            Payload::Data(v) => assert_eq!(v, json!({"a": 1})),
            other => panic!("expected data, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wraps_string_encoding() {
        let policy = BodyPolicy::new(Encoding::String, BodyShape::default(), 1024);
        let r = run(policy, Fixed { status: StatusCode::OK, body: "plain", failed: false }).await;
        match r.body {
            Payload::Data(v) => assert_eq!(v, json!({"content": "plain"})),
            other => panic!("expected data, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_noop_keeps_stream() {
        let policy = BodyPolicy::new(Encoding::NoOp, BodyShape::default(), 1024);
        let r = run(policy, Fixed { status: StatusCode::NOT_FOUND, body: "not found", failed: true }).await;
        assert!(matches!(r.body, Payload::Stream(_)));
    }

    #[tokio::test]
    async fn test_failed_response_body_released() {
        let policy = BodyPolicy::new(Encoding::Json, BodyShape::default(), 1024);
        let r = run(policy, Fixed { status: StatusCode::INTERNAL_SERVER_ERROR, body: "boom", failed: true }).await;
        assert!(r.body.is_empty());
        assert!(r.error.is_none());
    }

    #[tokio::test]
    async fn test_malformed_json_marks_failure() {
        let policy = BodyPolicy::new(Encoding::Json, BodyShape::default(), 1024);
        let r = run(policy, Fixed { status: StatusCode::OK, body: "{not json", failed: false }).await;
        assert!(r.failed);
        assert!(r.complete);
        assert!(matches!(r.error, Some(BackendError::Decode(_))));
    }

    #[tokio::test]
    async fn test_body_limit() {
        let policy = BodyPolicy::new(Encoding::Json, BodyShape::default(), 4);
        let r = run(policy, Fixed { status: StatusCode::OK, body: r#"{"a":12345}"#, failed: false }).await;
        assert!(matches!(r.error, Some(BackendError::BodyTooLarge(4))));
    }

    #[test]
    fn test_shape() {
        let shape = BodyShape {
            target: Some("data".into()),
            allow: vec!["id".into(), "name".into(), "secret".into()],
            deny: vec!["secret".into()],
            mapping: [("name".to_string(), "title".to_string())].into_iter().collect(),
        };
        let out = shape.apply(json!({
            "data": {"id": 1, "name": "x", "secret": "s", "extra": true},
            "meta": {}
        }));
        assert_eq!(out, json!({"id": 1, "title": "x"}));
    }
}
