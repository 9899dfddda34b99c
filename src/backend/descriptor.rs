//! Backend descriptor.
//!
//! # Responsibilities
//! - Hold the immutable, validated description of one upstream call
//! - Build the upstream URI from captured parameters and forwarded query

use std::time::Duration;

use axum::http::{Method, Uri};
use url::Url;

use crate::config::schema::{BackendConfig, TimeoutConfig};
use crate::routing::{PathTemplate, TemplateError};

/// HTTP client settings for one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub connect_timeout: Duration,
    pub pool_idle_timeout: Duration,
    pub max_idle_per_host: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(1),
            pool_idle_timeout: Duration::from_secs(90),
            max_idle_per_host: 32,
        }
    }
}

/// One upstream call of an endpoint. Immutable after startup.
#[derive(Debug, Clone)]
pub struct BackendDescriptor {
    /// Key under which this backend's data is merged; also used in logs and metrics.
    pub name: String,
    /// Scheme and authority, without trailing slash.
    pub host: String,
    pub url_pattern: PathTemplate,
    pub method: Method,
    /// Advisory budget, capped by the request deadline.
    pub timeout: Option<Duration>,
    pub client: ClientSettings,
}

/// Error raised while turning configuration into a descriptor.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("invalid backend host '{host}': {reason}")]
    InvalidHost { host: String, reason: String },
    #[error("invalid HTTP method '{0}'")]
    InvalidMethod(String),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl BackendDescriptor {
    /// Build a descriptor from configuration. `index` names unnamed backends.
    pub fn from_config(
        config: &BackendConfig,
        index: usize,
        timeouts: &TimeoutConfig,
    ) -> Result<Self, DescriptorError> {
        let host = parse_host(&config.host)?;
        let method = parse_method(&config.method)?;
        let url_pattern = PathTemplate::parse(&config.url_pattern)?;

        let defaults = ClientSettings::default();
        let client = ClientSettings {
            connect_timeout: Duration::from_millis(
                config.client.connect_timeout_ms.unwrap_or(timeouts.connect_ms),
            ),
            pool_idle_timeout: config
                .client
                .pool_idle_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.pool_idle_timeout),
            max_idle_per_host: config.client.max_idle_per_host.unwrap_or(defaults.max_idle_per_host),
        };

        Ok(Self {
            name: config
                .group
                .clone()
                .unwrap_or_else(|| format!("backend_{}", index)),
            host,
            url_pattern,
            method,
            timeout: config.timeout_ms.map(Duration::from_millis),
            client,
        })
    }

    /// Build the upstream URI.
    pub fn uri(
        &self,
        params: &std::collections::HashMap<String, String>,
        query: Option<&str>,
    ) -> Result<Uri, String> {
        let path = self.url_pattern.render(params).map_err(|e| e.to_string())?;
        let uri = match query {
            Some(q) if !q.is_empty() => format!("{}{}?{}", self.host, path, q),
            _ => format!("{}{}", self.host, path),
        };
        uri.parse::<Uri>().map_err(|e| e.to_string())
    }
}

/// Validate a backend base URL. Only plain `http` upstreams are supported.
pub fn parse_host(raw: &str) -> Result<String, DescriptorError> {
    let invalid = |reason: &str| DescriptorError::InvalidHost {
        host: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    if url.scheme() != "http" {
        return Err(invalid("only http:// upstreams are supported"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    if url.path() != "/" || url.query().is_some() {
        return Err(invalid("host must not carry a path or query"));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

pub fn parse_method(raw: &str) -> Result<Method, DescriptorError> {
    Method::from_bytes(raw.to_ascii_uppercase().as_bytes())
        .map_err(|_| DescriptorError::InvalidMethod(raw.to_string()))
}
