//! Cross-origin policy.
//!
//! # Responsibilities
//! - Build the `tower_http` CORS layer from configuration
//! - Refuse preflights from origins (or for methods) outside the policy
//!
//! # Design Decisions
//! - Shapes headers only: an actual request from an origin that is not
//!   allow-listed still reaches the endpoint, its response simply carries
//!   no CORS headers and the browser withholds it
//! - Preflights never reach the endpoint: allowed ones are answered by the
//!   layer, the rest get 403 without CORS headers
//! - `*` with credentials mirrors the request origin, since a literal
//!   wildcard cannot be combined with credentials

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{ACCESS_CONTROL_REQUEST_METHOD, ORIGIN};
use axum::http::{HeaderName, HeaderValue, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use tower_http::cors::{AllowCredentials, AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use crate::config::schema::CorsConfig;
use crate::http::response::status_response;
use crate::observability::metrics;

/// Parsed cross-origin settings.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    any_origin: bool,
    origins: Vec<HeaderValue>,
    methods: Vec<Method>,
    headers: Vec<HeaderName>,
    expose: Vec<HeaderName>,
    credentials: bool,
    max_age: Duration,
}

impl CorsPolicy {
    pub fn from_config(config: &CorsConfig) -> Self {
        let header_names = |items: &[String]| -> Vec<HeaderName> {
            items
                .iter()
                .filter_map(|h| match HeaderName::from_bytes(h.trim().as_bytes()) {
                    Ok(name) => Some(name),
                    Err(_) => {
                        tracing::warn!(header = %h, "Ignoring invalid CORS header name");
                        None
                    }
                })
                .collect()
        };

        Self {
            any_origin: config.allow_origins.iter().any(|o| o == "*"),
            origins: config
                .allow_origins
                .iter()
                .filter(|o| *o != "*")
                .filter_map(|o| match HeaderValue::from_str(o.trim().trim_end_matches('/')) {
                    Ok(origin) => Some(origin),
                    Err(_) => {
                        tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect(),
            methods: config
                .allow_methods
                .iter()
                .filter_map(|m| Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes()).ok())
                .collect(),
            headers: header_names(&config.allow_headers),
            expose: header_names(&config.expose_headers),
            credentials: config.allow_credentials,
            max_age: Duration::from_secs(config.max_age_secs),
        }
    }

    pub fn allows_origin(&self, origin: &HeaderValue) -> bool {
        self.any_origin || self.origins.contains(origin)
    }

    fn allows_method(&self, method: &HeaderValue) -> bool {
        self.methods.iter().any(|m| m.as_str().as_bytes() == method.as_bytes())
    }

    /// The response-header layer. Must sit outside the authentication gate
    /// so its early responses are decorated too.
    pub fn layer(&self) -> CorsLayer {
        let origin = match (self.any_origin, self.credentials) {
            (true, false) => AllowOrigin::any(),
            (true, true) => AllowOrigin::mirror_request(),
            (false, _) => AllowOrigin::list(self.origins.clone()),
        };

        let headers = if self.headers.is_empty() {
            AllowHeaders::mirror_request()
        } else {
            AllowHeaders::list(self.headers.clone())
        };

        let mut layer = CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(AllowMethods::list(self.methods.clone()))
            .allow_headers(headers)
            .expose_headers(self.expose.clone())
            .max_age(self.max_age);

        if self.credentials {
            let origins = Arc::new(self.clone());
            layer = layer.allow_credentials(AllowCredentials::predicate(move |origin, _| {
                origins.allows_origin(origin)
            }));
        }
        layer
    }
}

/// Answer 403 to a preflight the layer would not approve.
pub async fn preflight_guard(
    State(policy): State<Arc<CorsPolicy>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS {
        let headers = request.headers();
        if let (Some(origin), Some(method)) =
            (headers.get(ORIGIN), headers.get(ACCESS_CONTROL_REQUEST_METHOD))
        {
            if !policy.allows_origin(origin) || !policy.allows_method(method) {
                tracing::debug!(origin = ?origin, method = ?method, "Preflight rejected");
                metrics::record_gate_rejection("cors");
                return status_response(StatusCode::FORBIDDEN);
            }
        }
    }
    next.run(request).await
}
