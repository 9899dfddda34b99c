//! Header manipulation.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers from forwarded requests and backend responses
//! - Add X-Forwarded-Host for backends
//!
//! # Design Decisions
//! - Headers listed in `Connection` are treated as hop-by-hop too
//! - Never trust an incoming X-Forwarded-Host; it is overwritten

use axum::http::header::{
    HeaderName, CONNECTION, HOST, PROXY_AUTHENTICATE, PROXY_AUTHORIZATION, TE, TRAILER,
    TRANSFER_ENCODING, UPGRADE,
};
use axum::http::HeaderMap;

pub const X_FORWARDED_HOST: &str = "x-forwarded-host";

const KEEP_ALIVE: &str = "keep-alive";

/// Returns true for connection-level headers that must not cross a proxy.
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    *name == CONNECTION
        || *name == PROXY_AUTHENTICATE
        || *name == PROXY_AUTHORIZATION
        || *name == TE
        || *name == TRAILER
        || *name == TRANSFER_ENCODING
        || *name == UPGRADE
        || name.as_str() == KEEP_ALIVE
}

/// Remove hop-by-hop headers, including those nominated by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let nominated: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in nominated {
        headers.remove(name);
    }

    let hop: Vec<HeaderName> = headers.keys().filter(|n| is_hop_by_hop(n)).cloned().collect();
    for name in hop {
        headers.remove(name);
    }
}

/// Record the original Host for backends.
pub fn set_forwarded_host(incoming: &HeaderMap, outgoing: &mut HeaderMap) {
    let forwarded = HeaderName::from_static(X_FORWARDED_HOST);
    match incoming.get(HOST) {
        Some(host) => {
            outgoing.insert(forwarded, host.clone());
        }
        None => {
            outgoing.remove(forwarded);
        }
    }
}
