//! Verbatim renderer.
//!
//! Copies status and headers as received and hands the body stream to the
//! connection without buffering it.

use axum::body::Body;
use axum::http::header::CONTENT_LENGTH;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::backend::Payload;
use crate::proxy::CombinedResponse;

pub fn render(combined: CombinedResponse) -> Response {
    let mut headers = combined.headers;
    let body = match combined.body {
        Payload::Stream(body) => body,
        Payload::Empty => Body::empty(),
        Payload::Data(value) => match serde_json::to_vec(&value) {
            Ok(bytes) => {
                // Re-encoded: the upstream length no longer describes it.
                headers.remove(CONTENT_LENGTH);
                Body::from(bytes)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize response body");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        },
    };

    let mut response = Response::new(body);
    *response.status_mut() = combined.status;
    *response.headers_mut() = headers;
    response
}
