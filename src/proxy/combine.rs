//! Combination of backend results.
//!
//! # Responsibilities
//! - Merge decoded backend bodies into one object keyed by backend name
//! - Select the overall status from the endpoint policy
//! - Merge headers with first-declared-wins precedence
//! - Forward a single backend response unchanged in pass-through mode
//!
//! # Status Selection
//! ```text
//! merge, every backend succeeded         → 200
//! merge, some failed, not all-required   → partial status (default 200)
//! merge, some failed, all-required       → 502
//! merge, none succeeded                  → 500
//! pass-through, response received        → upstream status, verbatim
//! pass-through, no usable response       → upstream status if known, else 502
//! ```

use std::sync::Arc;

use axum::http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use axum::http::{HeaderMap, HeaderName, StatusCode};
use serde_json::{Map, Value};

use crate::backend::{BackendDescriptor, LogicalResponse, Payload};
use crate::proxy::endpoint::CombinePolicy;

/// Output of the pipeline, consumed by exactly one renderer.
#[derive(Debug)]
pub struct CombinedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Payload,
    /// Every backend produced an accepted response.
    pub complete: bool,
}

impl CombinedResponse {
    /// Generic failure with no body and no upstream detail.
    pub fn error(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Payload::Empty,
            complete: false,
        }
    }
}

/// Combine results given in backend declaration order.
pub fn combine(
    policy: CombinePolicy,
    backends: &[Arc<BackendDescriptor>],
    results: Vec<LogicalResponse>,
) -> CombinedResponse {
    match policy {
        CombinePolicy::PassThrough => match results.into_iter().next() {
            Some(response) => pass_through(response),
            None => CombinedResponse::error(StatusCode::INTERNAL_SERVER_ERROR),
        },
        CombinePolicy::Merge {
            all_required,
            partial_status,
        } => merge(backends, results, all_required, partial_status),
    }
}

fn pass_through(response: LogicalResponse) -> CombinedResponse {
    match (response.complete, response.error.is_none(), response.status) {
        (true, true, Some(status)) => CombinedResponse {
            status,
            headers: response.headers,
            body: response.body,
            complete: !response.failed,
        },
        (_, _, status) => CombinedResponse::error(status.unwrap_or(StatusCode::BAD_GATEWAY)),
    }
}

fn merge(
    backends: &[Arc<BackendDescriptor>],
    results: Vec<LogicalResponse>,
    all_required: bool,
    partial_status: StatusCode,
) -> CombinedResponse {
    let total = results.len();
    let mut data = Map::new();
    let mut headers = HeaderMap::new();
    let mut succeeded = 0;

    for (backend, response) in backends.iter().zip(results) {
        if !response.is_success() {
            continue;
        }
        succeeded += 1;

        for name in response.headers.keys() {
            if skip_merged_header(name) || headers.contains_key(name) {
                continue;
            }
            for value in response.headers.get_all(name) {
                headers.append(name.clone(), value.clone());
            }
        }

        match response.body {
            Payload::Data(value) => {
                data.insert(backend.name.clone(), value);
            }
            Payload::Empty => {
                data.insert(backend.name.clone(), Value::Null);
            }
            Payload::Stream(_) => {
                tracing::debug!(backend = %backend.name, "Undecoded body left out of merge");
            }
        }
    }

    if succeeded == 0 {
        return CombinedResponse::error(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let complete = succeeded == total;
    let status = match (complete, all_required) {
        (true, _) => StatusCode::OK,
        (false, true) => return CombinedResponse::error(StatusCode::BAD_GATEWAY),
        (false, false) => partial_status,
    };

    CombinedResponse {
        status,
        headers,
        body: Payload::Data(Value::Object(data)),
        complete,
    }
}

/// Headers describing a single upstream body are meaningless on the merged one.
fn skip_merged_header(name: &HeaderName) -> bool {
    *name == CONTENT_LENGTH
        || *name == CONTENT_TYPE
        || *name == CONTENT_ENCODING
        || *name == TRANSFER_ENCODING
}
