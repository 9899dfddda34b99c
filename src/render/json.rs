//! Structural-merge renderer.
//!
//! Serializes the merged object as JSON and marks whether every backend
//! contributed (`X-Gateway-Completed`).

use axum::body::Body;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::backend::Payload;
use crate::proxy::CombinedResponse;

pub const X_GATEWAY_COMPLETED: HeaderName = HeaderName::from_static("x-gateway-completed");

pub fn render(combined: CombinedResponse) -> Response {
    let (body, is_json) = match combined.body {
        Payload::Data(value) => match serde_json::to_vec(&value) {
            Ok(bytes) => (Body::from(bytes), true),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize merged body");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        },
        Payload::Stream(body) => (body, false),
        Payload::Empty => (Body::empty(), false),
    };

    let mut response = Response::new(body);
    *response.status_mut() = combined.status;

    let headers = response.headers_mut();
    headers.extend(combined.headers);
    if is_json {
        headers.remove(CONTENT_LENGTH);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    headers.insert(
        X_GATEWAY_COMPLETED,
        HeaderValue::from_static(if combined.complete { "true" } else { "false" }),
    );
    response
}
