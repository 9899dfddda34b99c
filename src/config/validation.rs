//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check endpoint/backend structure (backend counts, templates, hosts)
//! - Validate value ranges (timeouts > 0, status codes)
//! - Detect conflicting endpoints
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Renderer names are checked at startup against the live registry, not here

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::backend::descriptor::{parse_host, parse_method};
use crate::config::schema::{AuthConfig, EncodingKind, EndpointConfig, GatewayConfig, PolicyKind};
use crate::decorator::StatusPolicy;
use crate::routing::PathTemplate;

/// One semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{location}: {message}")]
pub struct ValidationError {
    pub location: String,
    pub message: String,
}

impl ValidationError {
    fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}

/// Validate the whole configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("listener.bind_address", "not a socket address"));
    }
    if config.timeouts.endpoint_ms == 0 {
        errors.push(ValidationError::new("timeouts.endpoint_ms", "must be greater than zero"));
    }
    if config.timeouts.server_secs == 0 {
        errors.push(ValidationError::new("timeouts.server_secs", "must be greater than zero"));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "not a socket address",
        ));
    }
    if config.auth.enabled {
        validate_auth(&config.auth, &mut errors);
    }

    let mut routes = HashSet::new();
    for (i, endpoint) in config.endpoints.iter().enumerate() {
        let location = format!("endpoints[{}] {}", i, endpoint.endpoint);
        if !routes.insert((endpoint.method.to_ascii_uppercase(), endpoint.endpoint.clone())) {
            errors.push(ValidationError::new(&location, "duplicate method and path"));
        }
        validate_endpoint(endpoint, &location, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_auth(auth: &AuthConfig, errors: &mut Vec<ValidationError>) {
    let hmac = auth.algorithm.trim().to_ascii_uppercase().starts_with("HS");
    let has_secret = auth.secret.as_deref().is_some_and(|s| !s.is_empty());
    let has_pem = auth.public_key_pem.is_some() || auth.public_key_path.is_some();

    if hmac && !has_secret {
        errors.push(ValidationError::new("auth.secret", "required for HMAC algorithms"));
    }
    if !hmac && !has_pem {
        errors.push(ValidationError::new(
            "auth.public_key_pem",
            "a public key (inline or path) is required for asymmetric algorithms",
        ));
    }
}

fn validate_endpoint(endpoint: &EndpointConfig, location: &str, errors: &mut Vec<ValidationError>) {
    let path = match PathTemplate::parse(&endpoint.endpoint) {
        Ok(path) => Some(path),
        Err(e) => {
            errors.push(ValidationError::new(location, e.to_string()));
            None
        }
    };

    if let Err(e) = parse_method(&endpoint.method) {
        errors.push(ValidationError::new(location, e.to_string()));
    }
    if endpoint.timeout_ms == Some(0) {
        errors.push(ValidationError::new(location, "timeout_ms must be greater than zero"));
    }
    if !(100..=599).contains(&endpoint.partial_status) {
        errors.push(ValidationError::new(
            location,
            format!("partial_status {} is not a valid status", endpoint.partial_status),
        ));
    }

    match (endpoint.policy, endpoint.backends.len()) {
        (_, 0) => errors.push(ValidationError::new(location, "at least one backend is required")),
        (PolicyKind::PassThrough, n) if n != 1 => errors.push(ValidationError::new(
            location,
            format!("pass-through needs exactly one backend, found {}", n),
        )),
        _ => {}
    }

    let mut groups = HashSet::new();
    for (j, backend) in endpoint.backends.iter().enumerate() {
        let location = format!("{} backends[{}]", location, j);

        if let Err(e) = parse_host(&backend.host) {
            errors.push(ValidationError::new(&location, e.to_string()));
        }
        if let Err(e) = parse_method(&backend.method) {
            errors.push(ValidationError::new(&location, e.to_string()));
        }
        if let Err(e) = StatusPolicy::parse(&backend.accept_status) {
            errors.push(ValidationError::new(&location, e.to_string()));
        }
        if backend.timeout_ms == Some(0) {
            errors.push(ValidationError::new(&location, "timeout_ms must be greater than zero"));
        }
        if backend.retry.as_ref().is_some_and(|r| r.max_attempts == 0) {
            errors.push(ValidationError::new(&location, "retry.max_attempts must be at least 1"));
        }

        match PathTemplate::parse(&backend.url_pattern) {
            Ok(pattern) => {
                if let Some(path) = &path {
                    for param in pattern.params() {
                        if !path.params().any(|p| p == param) {
                            errors.push(ValidationError::new(
                                &location,
                                format!("url_pattern parameter '{}' is not captured by the endpoint", param),
                            ));
                        }
                    }
                }
            }
            Err(e) => errors.push(ValidationError::new(&location, e.to_string())),
        }

        if endpoint.policy == PolicyKind::Merge {
            if backend.encoding == EncodingKind::NoOp {
                errors.push(ValidationError::new(
                    &location,
                    "no-op encoding cannot be merged; use the pass-through policy",
                ));
            }
            let key = backend.group.clone().unwrap_or_else(|| format!("backend_{}", j));
            if !groups.insert(key.clone()) {
                errors.push(ValidationError::new(&location, format!("duplicate group '{}'", key)));
            }
        }
    }
}
