//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the axum Router from the endpoint handlers
//! - Wire up middleware (request ID, tracing, safety-net timeout, gates)
//! - Serve on a bound listener until shutdown is signalled
//!
//! # Design Decisions
//! - One route per endpoint path; methods of the same path share it
//! - Gates wrap every route, the debug endpoint included
//! - The server timeout is a backstop; endpoint deadlines normally fire first

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::routing::{any, on, MethodFilter, MethodRouter};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::schema::GatewayConfig;
use crate::http::debug;
use crate::http::handler::EndpointHandler;
use crate::http::middleware::GateChain;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};

/// Path prefix of the debug echo endpoint.
pub const DEBUG_PREFIX: &str = "/__debug";

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("duplicate endpoint {method} {path}")]
    Duplicate { method: Method, path: String },
    #[error("method {method} of {path} cannot be routed")]
    UnsupportedMethod { method: Method, path: String },
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(
        config: &GatewayConfig,
        handlers: Vec<Arc<EndpointHandler>>,
        gates: GateChain,
    ) -> Result<Self, RouteError> {
        let router = Self::build_router(config, handlers, gates)?;
        Ok(Self { router })
    }

    /// Build the axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &GatewayConfig,
        handlers: Vec<Arc<EndpointHandler>>,
        gates: GateChain,
    ) -> Result<Router, RouteError> {
        let mut routes: BTreeMap<String, MethodRouter> = BTreeMap::new();
        let mut seen = HashSet::new();

        for handler in handlers {
            let path = handler.endpoint().path.to_string();
            let method = handler.endpoint().method.clone();

            if !seen.insert((path.clone(), method.clone())) {
                return Err(RouteError::Duplicate { method, path });
            }
            let filter = MethodFilter::try_from(method.clone())
                .map_err(|_| RouteError::UnsupportedMethod { method: method.clone(), path: path.clone() })?;

            let endpoint = move |request: Request<Body>| {
                let handler = handler.clone();
                async move { handler.handle(request).await }
            };

            let method_router = match routes.remove(&path) {
                Some(existing) => existing.on(filter, endpoint),
                None => on(filter, endpoint),
            };
            routes.insert(path, method_router);
        }

        let mut router = Router::new();
        for (path, method_router) in routes {
            tracing::debug!(path = %path, "Route registered");
            router = router.route(&path, method_router);
        }

        if config.debug {
            tracing::info!(path = DEBUG_PREFIX, "Debug endpoint enabled");
            router = router.route(&format!("{}/{{*path}}", DEBUG_PREFIX), any(debug::echo));
        }

        Ok(gates
            .wrap(router)
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.server_secs)))
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer()))
    }

    /// Serve until a shutdown message arrives (or its sender is dropped).
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
