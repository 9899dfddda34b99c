//! Startup orchestration.
//!
//! # Responsibilities
//! - Turn validated configuration into endpoint handlers
//! - Fold one decorator chain per backend around its HTTP invoker
//! - Resolve every endpoint's renderer and build the gate chain
//!
//! # Design Decisions
//! - Fail fast: any error here aborts the process before a socket is bound
//! - Each backend gets its own client, configured from its own settings

use std::sync::Arc;

use crate::backend::{HttpInvoker, Invoker};
use crate::config::schema::GatewayConfig;
use crate::decorator::{stages_for, InvocationStats, StatusRangeError};
use crate::http::handler::EndpointHandler;
use crate::http::middleware::{AuthSetupError, GateChain};
use crate::http::server::{GatewayServer, RouteError};
use crate::proxy::{CombinePolicy, EndpointDefinition, EndpointError, PipelineError, ProxyPipeline};
use crate::render::{RegistryError, RendererRegistry};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
    #[error("endpoint {endpoint}: {source}")]
    StatusRange {
        endpoint: String,
        #[source]
        source: StatusRangeError,
    },
    #[error("endpoint {endpoint}: {source}")]
    Renderer {
        endpoint: String,
        #[source]
        source: RegistryError,
    },
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Auth(#[from] AuthSetupError),
    #[error(transparent)]
    Route(#[from] RouteError),
}

/// Build one handler per configured endpoint.
pub fn build_handlers(
    config: &GatewayConfig,
    registry: &RendererRegistry,
    stats: Arc<InvocationStats>,
) -> Result<Vec<Arc<EndpointHandler>>, StartupError> {
    let mut handlers = Vec::with_capacity(config.endpoints.len());

    for endpoint_config in &config.endpoints {
        let mut definition = EndpointDefinition::from_config(endpoint_config, &config.timeouts)?;
        if let Some(encoding) = &config.output_encoding {
            definition.output_encoding = encoding.clone();
        }

        let mut invokers: Vec<Arc<dyn Invoker>> = Vec::with_capacity(definition.backends.len());
        for (backend_config, descriptor) in endpoint_config.backends.iter().zip(&definition.backends) {
            let base: Arc<dyn Invoker> = Arc::new(HttpInvoker::new(&descriptor.client));
            let pass_through = definition.policy == CombinePolicy::PassThrough;
            let chain = stages_for(backend_config, pass_through, &config.security, stats.clone())
                .map_err(|source| StartupError::StatusRange {
                    endpoint: endpoint_config.endpoint.clone(),
                    source,
                })?;

            tracing::debug!(
                endpoint = %definition.path,
                backend = %descriptor.name,
                stages = ?chain.stage_names(),
                "Backend chain built"
            );
            invokers.push(chain.build(base));
        }

        let pipeline = ProxyPipeline::new(Arc::new(definition), invokers)?;
        let handler = EndpointHandler::new(pipeline, registry, config.security.max_body_size).map_err(
            |source| StartupError::Renderer {
                endpoint: endpoint_config.endpoint.clone(),
                source,
            },
        )?;

        tracing::info!(
            endpoint = %handler.endpoint().path,
            method = %handler.endpoint().method,
            backends = handler.endpoint().backends.len(),
            renderer = %handler.endpoint().output_encoding,
            "Endpoint ready"
        );
        handlers.push(Arc::new(handler));
    }

    Ok(handlers)
}

/// Build handlers, gates and router.
pub fn build_server(
    config: &GatewayConfig,
    registry: &RendererRegistry,
    stats: Arc<InvocationStats>,
) -> Result<GatewayServer, StartupError> {
    let handlers = build_handlers(config, registry, stats)?;
    let gates = GateChain::from_config(&config.cors, &config.auth)?;
    tracing::info!(gates = ?gates.names(), "Gate chain built");
    Ok(GatewayServer::new(config, handlers, gates)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(toml: &str) -> GatewayConfig {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn test_unknown_renderer_is_startup_error() {
        let cfg = config(
            r#"
            [[endpoints]]
            endpoint = "/status"
            output_encoding = "xml"

            [[endpoints.backends]]
            host = "http://127.0.0.1:3000"
            url_pattern = "/a"
            "#,
        );
        let err = build_handlers(&cfg, &RendererRegistry::with_defaults(), Default::default())
            .err()
            .unwrap();
        assert!(matches!(err, StartupError::Renderer { .. }));
    }

    #[test]
    fn test_output_encoding_override() {
        let cfg = config(
            r#"
            output_encoding = "no-op"

            [[endpoints]]
            endpoint = "/status"

            [[endpoints.backends]]
            host = "http://127.0.0.1:3000"
            url_pattern = "/a"
            "#,
        );
        let handlers =
            build_handlers(&cfg, &RendererRegistry::with_defaults(), Default::default()).unwrap();
        assert_eq!(handlers[0].endpoint().output_encoding, "no-op");
    }

    #[test]
    fn test_empty_backends_is_startup_error() {
        let cfg = config(
            r#"
            [[endpoints]]
            endpoint = "/status"
            backends = []
            "#,
        );
        let err = build_handlers(&cfg, &RendererRegistry::with_defaults(), Default::default())
            .err()
            .unwrap();
        assert!(matches!(err, StartupError::Endpoint(EndpointError::EmptyBackends(_))));
    }

    #[test]
    fn test_duplicate_route_is_startup_error() {
        let cfg = config(
            r#"
            [[endpoints]]
            endpoint = "/status"
            [[endpoints.backends]]
            host = "http://127.0.0.1:3000"
            url_pattern = "/a"

            [[endpoints]]
            endpoint = "/status"
            [[endpoints.backends]]
            host = "http://127.0.0.1:3000"
            url_pattern = "/b"
            "#,
        );
        let err = build_server(&cfg, &RendererRegistry::with_defaults(), Default::default())
            .err()
            .unwrap();
        assert!(matches!(err, StartupError::Route(RouteError::Duplicate { .. })));
    }
}
