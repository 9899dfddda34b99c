//! Request parameters handed to every backend call.
//!
//! # Responsibilities
//! - Capture path parameters using the endpoint template
//! - Filter query string and headers through the endpoint allow-lists
//! - Read the incoming body once, bounded, and share it by reference
//! - Read an optional caller deadline hint

use std::collections::HashMap;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::header::{HeaderName, CONTENT_LENGTH, HOST};
use axum::http::{HeaderMap, HeaderValue, Method, Request};

use crate::http::request::{RequestIdExt, X_REQUEST_ID};
use crate::proxy::endpoint::EndpointDefinition;
use crate::security::headers::{is_hop_by_hop, set_forwarded_host};

/// Header a caller may use to shorten the endpoint deadline, in milliseconds.
pub const X_REQUEST_TIMEOUT: &str = "x-request-timeout";

/// Everything a backend call needs from the incoming request.
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    pub request_id: String,
    pub method: Method,
    pub path_params: HashMap<String, String>,
    /// Already filtered, still encoded.
    pub query: Option<String>,
    /// Headers to forward.
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Caller-requested deadline, if any.
    pub timeout_hint: Option<Duration>,
}

#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    #[error("request body exceeds {0} bytes")]
    BodyTooLarge(usize),
}

impl RequestParams {
    /// Extract parameters from an incoming request.
    pub async fn extract(
        endpoint: &EndpointDefinition,
        request: Request<Body>,
        max_body_size: usize,
    ) -> Result<Self, ParamsError> {
        let (parts, body) = request.into_parts();
        let request_id = parts.headers.request_id().unwrap_or("unknown").to_string();

        let body = axum::body::to_bytes(body, max_body_size)
            .await
            .map_err(|_| ParamsError::BodyTooLarge(max_body_size))?;

        let path_params = endpoint
            .path
            .captures(parts.uri.path())
            .unwrap_or_default();

        let query = parts
            .uri
            .query()
            .map(|q| filter_query(q, |key| endpoint.input_query_strings.allows(key)))
            .filter(|q| !q.is_empty());

        let mut headers = HeaderMap::new();
        for (name, value) in parts.headers.iter() {
            if forwardable(name) && endpoint.input_headers.allows(name.as_str()) {
                headers.append(name.clone(), value.clone());
            }
        }
        if let Ok(id) = HeaderValue::from_str(&request_id) {
            headers.insert(X_REQUEST_ID, id);
        }
        set_forwarded_host(&parts.headers, &mut headers);

        let timeout_hint = parts
            .headers
            .get(X_REQUEST_TIMEOUT)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_millis);

        Ok(Self {
            request_id,
            method: parts.method,
            path_params,
            query,
            headers,
            body,
            timeout_hint,
        })
    }
}

fn forwardable(name: &HeaderName) -> bool {
    !is_hop_by_hop(name) && *name != HOST && *name != CONTENT_LENGTH
}

/// Keep only `key=value` pairs whose key passes the filter.
fn filter_query(query: &str, allow: impl Fn(&str) -> bool) -> String {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let pair: &str = pair;
            let key = pair.split_once('=').map(|(k, _)| k).unwrap_or(pair);
            allow(key)
        })
        .collect::<Vec<_>>()
        .join("&")
}
