//! HTTP backend invoker.
//!
//! # Responsibilities
//! - Build the upstream request from descriptor and request parameters
//! - Send it with the effective call deadline and the request's cancellation token
//! - Normalize the upstream answer into a `LogicalResponse`
//!
//! # Design Decisions
//! - Returns as soon as the response head arrives; the body stays a stream
//! - Dropping the in-flight future on timeout/cancel releases the connection
//! - Hop-by-hop headers are stripped here, so everything downstream sees
//!   end-to-end headers only

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Version};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};

use crate::backend::{BackendDescriptor, BackendError, CallContext, ClientSettings, Invoker, LogicalResponse};
use crate::proxy::params::RequestParams;
use crate::security::headers::strip_hop_by_hop;

/// Invoker that performs one HTTP/1.1 call per invocation.
#[derive(Clone)]
pub struct HttpInvoker {
    client: Client<HttpConnector, Body>,
}

impl HttpInvoker {
    pub fn new(settings: &ClientSettings) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(settings.connect_timeout));
        connector.set_nodelay(true);
        connector.set_keepalive(Some(Duration::from_secs(60)));

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(settings.pool_idle_timeout)
            .pool_max_idle_per_host(settings.max_idle_per_host)
            .build(connector);

        Self { client }
    }

    fn build_request(
        backend: &BackendDescriptor,
        params: &RequestParams,
    ) -> Result<Request<Body>, BackendError> {
        let uri = backend
            .uri(&params.path_params, params.query.as_deref())
            .map_err(BackendError::InvalidRequest)?;

        let mut builder = Request::builder()
            .method(backend.method.clone())
            .uri(uri)
            .version(Version::HTTP_11);

        if let Some(headers) = builder.headers_mut() {
            headers.extend(params.headers.clone());
        }

        builder
            .body(Body::from(params.body.clone()))
            .map_err(|e| BackendError::InvalidRequest(e.to_string()))
    }
}

#[async_trait]
impl Invoker for HttpInvoker {
    async fn invoke(
        &self,
        ctx: &CallContext,
        backend: &BackendDescriptor,
        params: &RequestParams,
    ) -> LogicalResponse {
        let request = match Self::build_request(backend, params) {
            Ok(r) => r,
            Err(e) => return LogicalResponse::incomplete(e),
        };

        let deadline = ctx.call_deadline(backend.timeout);

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => LogicalResponse::incomplete(BackendError::Cancelled),
            result = tokio::time::timeout_at(deadline, self.client.request(request)) => match result {
                Err(_) => LogicalResponse::incomplete(BackendError::Timeout),
                Ok(Err(e)) => LogicalResponse::incomplete(BackendError::Transport(e.to_string())),
                Ok(Ok(response)) => {
                    let (mut parts, body) = response.into_parts();
                    strip_hop_by_hop(&mut parts.headers);
                    LogicalResponse::received(parts.status, parts.headers, Body::new(body))
                }
            },
        }
    }
}
