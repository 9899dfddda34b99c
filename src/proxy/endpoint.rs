//! Endpoint definitions.
//!
//! # Responsibilities
//! - Turn endpoint configuration into an immutable, shareable definition
//! - Enforce the structural invariants (non-empty backends, single
//!   backend for pass-through) at startup

use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, StatusCode};

use crate::backend::descriptor::{parse_method, BackendDescriptor, DescriptorError};
use crate::config::schema::{EndpointConfig, PolicyKind, TimeoutConfig};
use crate::routing::{PathTemplate, TemplateError};

/// How backend results are combined into one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinePolicy {
    /// Each backend contributes a named sub-tree.
    Merge {
        all_required: bool,
        partial_status: StatusCode,
    },
    /// The single backend's response is forwarded unchanged.
    PassThrough,
}

/// Allow-list of forwarded header names or query keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardList {
    All,
    Only(Vec<String>),
}

impl ForwardList {
    pub fn from_config(entries: &[String]) -> Self {
        if entries.iter().any(|e| e == "*") {
            ForwardList::All
        } else {
            ForwardList::Only(entries.iter().map(|e| e.to_ascii_lowercase()).collect())
        }
    }

    /// Case-insensitive membership test.
    pub fn allows(&self, name: &str) -> bool {
        match self {
            ForwardList::All => true,
            ForwardList::Only(names) => names.iter().any(|n| n.eq_ignore_ascii_case(name)),
        }
    }
}

/// One public endpoint. Shared read-only by every request.
#[derive(Debug, Clone)]
pub struct EndpointDefinition {
    pub path: PathTemplate,
    pub method: Method,
    pub backends: Vec<Arc<BackendDescriptor>>,
    pub policy: CombinePolicy,
    /// Render mode name.
    pub output_encoding: String,
    /// Default request deadline.
    pub timeout: Duration,
    pub input_headers: ForwardList,
    pub input_query_strings: ForwardList,
}

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("endpoint {0} declares no backends")]
    EmptyBackends(String),
    #[error("pass-through endpoint {path} needs exactly one backend, found {count}")]
    PassThroughBackends { path: String, count: usize },
    #[error("endpoint {path}: invalid partial status {status}")]
    InvalidStatus { path: String, status: u16 },
    #[error("endpoint {path}: {source}")]
    Backend {
        path: String,
        #[source]
        source: DescriptorError,
    },
    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl EndpointDefinition {
    pub fn from_config(
        config: &EndpointConfig,
        timeouts: &TimeoutConfig,
    ) -> Result<Self, EndpointError> {
        let path = PathTemplate::parse(&config.endpoint)?;
        let backend_err = |source| EndpointError::Backend {
            path: config.endpoint.clone(),
            source,
        };
        let method = parse_method(&config.method).map_err(backend_err)?;

        if config.backends.is_empty() {
            return Err(EndpointError::EmptyBackends(config.endpoint.clone()));
        }

        let policy = match config.policy {
            PolicyKind::PassThrough => {
                if config.backends.len() != 1 {
                    return Err(EndpointError::PassThroughBackends {
                        path: config.endpoint.clone(),
                        count: config.backends.len(),
                    });
                }
                CombinePolicy::PassThrough
            }
            PolicyKind::Merge => CombinePolicy::Merge {
                all_required: config.all_required,
                partial_status: StatusCode::from_u16(config.partial_status).map_err(|_| {
                    EndpointError::InvalidStatus {
                        path: config.endpoint.clone(),
                        status: config.partial_status,
                    }
                })?,
            },
        };

        let backends = config
            .backends
            .iter()
            .enumerate()
            .map(|(i, b)| BackendDescriptor::from_config(b, i, timeouts).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend_err)?;

        Ok(Self {
            path,
            method,
            backends,
            policy,
            output_encoding: config.output_encoding.clone(),
            timeout: Duration::from_millis(config.timeout_ms.unwrap_or(timeouts.endpoint_ms)),
            input_headers: ForwardList::from_config(&config.input_headers),
            input_query_strings: ForwardList::from_config(&config.input_query_strings),
        })
    }
}
