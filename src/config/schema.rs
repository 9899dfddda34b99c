//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Cross-origin gate settings.
    pub cors: CorsConfig,

    /// Authentication gate settings.
    pub auth: AuthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Request limits.
    pub security: SecurityConfig,

    /// Expose the `/__debug/` echo endpoint.
    pub debug: bool,

    /// When set, every endpoint renders with this mode regardless of its own setting.
    pub output_encoding: Option<String>,

    /// Endpoint definitions, in declaration order.
    pub endpoints: Vec<EndpointConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

impl ListenerConfig {
    /// Replace the port of the bind address, keeping the host part.
    pub fn set_port(&mut self, port: u16) {
        let host = self
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        self.bind_address = format!("{}:{}", host, port);
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Default connection establishment timeout for backends, in milliseconds.
    pub connect_ms: u64,

    /// Default per-request deadline for endpoints without their own, in milliseconds.
    pub endpoint_ms: u64,

    /// Outer server timeout in seconds. Safety net above every endpoint deadline.
    pub server_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 1_000,
            endpoint_ms: 2_000,
            server_secs: 30,
        }
    }
}

/// Cross-origin gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    /// Allowed origins. `"*"` allows any origin.
    pub allow_origins: Vec<String>,
    pub allow_methods: Vec<String>,
    /// Allowed request headers. Empty echoes whatever the preflight asked for.
    pub allow_headers: Vec<String>,
    pub expose_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allow_origins: Vec::new(),
            allow_methods: ["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allow_headers: Vec::new(),
            expose_headers: vec!["Content-Length".to_string(), "Content-Type".to_string()],
            allow_credentials: false,
            max_age_secs: 12 * 3600,
        }
    }
}

/// Authentication gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,

    /// JWS algorithm name (HS256, RS256, ES256, EdDSA, ...).
    pub algorithm: String,

    /// Shared secret for HMAC algorithms.
    pub secret: Option<String>,

    /// Inline PEM public key for asymmetric algorithms.
    pub public_key_pem: Option<String>,

    /// Path to a PEM public key. Read once at startup.
    pub public_key_path: Option<String>,

    /// Expected `iss` claim.
    pub issuer: Option<String>,

    /// Expected `aud` claim.
    pub audience: Option<String>,

    /// Claims that must be present in every token.
    pub required_claims: Vec<String>,

    /// Clock skew tolerance in seconds.
    pub leeway_secs: u64,

    /// Claims copied into request headers for backends.
    pub propagate_claims: Vec<ClaimHeader>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            algorithm: "HS256".to_string(),
            secret: None,
            public_key_pem: None,
            public_key_path: None,
            issuer: None,
            audience: None,
            required_claims: Vec::new(),
            leeway_secs: 30,
            propagate_claims: Vec::new(),
        }
    }
}

/// A claim to copy into a request header.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClaimHeader {
    pub claim: String,
    pub header: String,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes, for both incoming requests and decoded backend bodies.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// How backend results are combined.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    #[default]
    Merge,
    PassThrough,
}

/// One publicly exposed endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Public path template, e.g. "/users/{id}".
    pub endpoint: String,

    #[serde(default = "default_method")]
    pub method: String,

    #[serde(default)]
    pub policy: PolicyKind,

    /// Any backend failure fails the whole endpoint (merge policy only).
    #[serde(default)]
    pub all_required: bool,

    /// Status returned when some, but not all, backends succeed.
    #[serde(default = "default_partial_status")]
    pub partial_status: u16,

    /// Render mode name, resolved against the renderer registry at startup.
    #[serde(default = "default_output_encoding")]
    pub output_encoding: String,

    /// Per-request deadline in milliseconds. Falls back to `timeouts.endpoint_ms`.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Incoming headers forwarded to backends. `"*"` forwards all.
    #[serde(default)]
    pub input_headers: Vec<String>,

    /// Incoming query string keys forwarded to backends. `"*"` forwards all.
    #[serde(default)]
    pub input_query_strings: Vec<String>,

    pub backends: Vec<BackendConfig>,
}

/// One upstream call made on behalf of an endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Base URL, e.g. "http://127.0.0.1:3000".
    pub host: String,

    /// Path template, e.g. "/users/{id}".
    pub url_pattern: String,

    #[serde(default = "default_method")]
    pub method: String,

    /// Key under which this backend's data is merged. Defaults to the backend's position.
    #[serde(default)]
    pub group: Option<String>,

    /// Per-backend budget in milliseconds, capped by the endpoint deadline.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub encoding: EncodingKind,

    /// Status ranges counted as success, e.g. ["200-299", "404"].
    #[serde(default = "default_accept_status")]
    pub accept_status: Vec<String>,

    /// Select a nested object from the decoded body.
    #[serde(default)]
    pub target: Option<String>,

    /// Keep only these top-level fields.
    #[serde(default)]
    pub allow: Vec<String>,

    /// Drop these top-level fields.
    #[serde(default)]
    pub deny: Vec<String>,

    /// Rename top-level fields (old -> new).
    #[serde(default)]
    pub mapping: std::collections::BTreeMap<String, String>,

    #[serde(default)]
    pub retry: Option<RetryConfig>,

    #[serde(default)]
    pub client: ClientConfig,
}

/// Body encoding of a backend response.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EncodingKind {
    #[default]
    Json,
    String,
    NoOp,
}

/// Retry configuration for one backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 50,
            max_delay_ms: 1000,
        }
    }
}

/// HTTP client settings for one backend.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Connect timeout in milliseconds. Falls back to `timeouts.connect_ms`.
    pub connect_timeout_ms: Option<u64>,

    /// How long idle pooled connections are kept, in seconds.
    pub pool_idle_timeout_secs: Option<u64>,

    /// Maximum idle pooled connections per host.
    pub max_idle_per_host: Option<usize>,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_partial_status() -> u16 {
    200
}

fn default_output_encoding() -> String {
    "json".to_string()
}

fn default_accept_status() -> Vec<String> {
    vec!["200-299".to_string()]
}
