//! Debug echo endpoint (`/__debug/{*path}`).
//!
//! Reflects what the gateway received after the gates ran, which makes it
//! handy for checking claim propagation and CORS behavior.

use std::collections::BTreeMap;

use axum::body::Body;
use axum::http::Request;
use axum::Json;
use serde::Serialize;

use crate::http::request::RequestIdExt;

#[derive(Debug, Serialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: BTreeMap<String, Vec<String>>,
}

pub async fn echo(request: Request<Body>) -> Json<Echo> {
    let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in request.headers() {
        headers
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }

    let echo = Echo {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        query: request.uri().query().map(str::to_string),
        headers,
    };

    tracing::debug!(
        request_id = request.headers().request_id().unwrap_or("unknown"),
        method = %echo.method,
        path = %echo.path,
        "Debug endpoint hit"
    );
    Json(echo)
}
