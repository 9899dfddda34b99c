//! Renderer registry.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     RendererRegistry::with_defaults() → register("json"), register("no-op")
//!     → EndpointHandler::new() resolves the endpoint's render mode once
//!
//! Request time:
//!     CombinedResponse → RenderFn → axum Response
//! ```
//!
//! # Design Decisions
//! - The registry is an explicit value, filled before handlers are built
//!   and never mutated afterwards
//! - Unknown or duplicate names are startup errors

pub mod json;
pub mod passthrough;

use std::collections::HashMap;
use std::sync::Arc;

use axum::response::Response;

use crate::proxy::CombinedResponse;

/// Name of the structural-merge renderer.
pub const JSON: &str = "json";
/// Name of the verbatim renderer.
pub const NO_OP: &str = "no-op";

/// Turns a combined response into the wire response.
pub type RenderFn = Arc<dyn Fn(CombinedResponse) -> Response + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("renderer '{0}' is already registered")]
    Duplicate(String),
    #[error("unknown renderer '{0}'")]
    Unknown(String),
}

#[derive(Clone, Default)]
pub struct RendererRegistry {
    renderers: HashMap<String, RenderFn>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in `json` and `no-op` renderers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.renderers.insert(JSON.to_string(), Arc::new(json::render));
        registry
            .renderers
            .insert(NO_OP.to_string(), Arc::new(passthrough::render));
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, render: RenderFn) -> Result<(), RegistryError> {
        let name = name.into();
        if self.renderers.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        tracing::debug!(renderer = %name, "Renderer registered");
        self.renderers.insert(name, render);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<RenderFn, RegistryError> {
        self.renderers
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::Unknown(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn test_defaults_resolve() {
        let registry = RendererRegistry::with_defaults();
        assert!(registry.resolve(JSON).is_ok());
        assert!(registry.resolve(NO_OP).is_ok());
        assert_eq!(
            registry.resolve("xml").err(),
            Some(RegistryError::Unknown("xml".into()))
        );
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = RendererRegistry::with_defaults();
        let teapot: RenderFn = Arc::new(|_| StatusCode::IM_A_TEAPOT.into_response());

        assert_eq!(
            registry.register(JSON, teapot.clone()),
            Err(RegistryError::Duplicate(JSON.into()))
        );
        registry.register("teapot", teapot).unwrap();

        let render = registry.resolve("teapot").unwrap();
        let response = render(CombinedResponse::error(StatusCode::OK));
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    }
}
