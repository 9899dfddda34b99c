//! Endpoint handler.
//!
//! # Responsibilities
//! - Bind one endpoint's pipeline and renderer into a single callable
//! - Extract request parameters (413 when the body is too large)
//! - Record the per-request log line and metrics
//!
//! # Design Decisions
//! - The renderer is resolved once, at construction
//! - The handler knows nothing about routing; the server binds it

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;

use crate::http::response::status_response;
use crate::observability::metrics;
use crate::proxy::{EndpointDefinition, ProxyPipeline, RequestParams};
use crate::render::{RegistryError, RenderFn, RendererRegistry};

pub struct EndpointHandler {
    pipeline: ProxyPipeline,
    render: RenderFn,
    max_body_size: usize,
}

impl EndpointHandler {
    pub fn new(
        pipeline: ProxyPipeline,
        registry: &RendererRegistry,
        max_body_size: usize,
    ) -> Result<Self, RegistryError> {
        let render = registry.resolve(&pipeline.endpoint().output_encoding)?;
        Ok(Self {
            pipeline,
            render,
            max_body_size,
        })
    }

    pub fn endpoint(&self) -> &EndpointDefinition {
        self.pipeline.endpoint()
    }

    pub async fn handle(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let endpoint = self.endpoint();
        let method = request.method().to_string();

        let params = match RequestParams::extract(endpoint, request, self.max_body_size).await {
            Ok(params) => params,
            Err(e) => {
                tracing::warn!(endpoint = %endpoint.path, error = %e, "Rejecting request");
                let status = StatusCode::PAYLOAD_TOO_LARGE;
                metrics::record_request(&method, status.as_u16(), endpoint.path.as_str(), start);
                return status_response(status);
            }
        };
        let request_id = params.request_id.clone();

        let combined = self.pipeline.run(params).await;
        let response = (self.render)(combined);

        let status = response.status().as_u16();
        tracing::info!(
            request_id = %request_id,
            endpoint = %endpoint.path,
            method = %method,
            status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request handled"
        );
        metrics::record_request(&method, status, endpoint.path.as_str(), start);

        response
    }
}
