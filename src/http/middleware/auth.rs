//! Authentication gate.
//!
//! # Responsibilities
//! - Require a bearer token on every request
//! - Verify signature, expiry, issuer and audience
//! - Enforce configured required claims
//! - Attach verified claims to the request (extension + optional headers)
//!
//! # Design Decisions
//! - Verification material is loaded once at startup; a bad key aborts startup
//! - Every rejection is a bare 401; the reason is logged, never returned
//! - Client-supplied copies of propagated claim headers are always replaced

use std::str::FromStr;

use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};

use crate::config::schema::AuthConfig;
use crate::http::middleware::{Gate, GateDecision};
use crate::http::request::RequestIdExt;
use crate::http::response::unauthorized;

/// Verified token claims, available as a request extension.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims(pub Map<String, Value>);

impl Claims {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthSetupError {
    #[error("unsupported JWT algorithm '{0}'")]
    Algorithm(String),
    #[error("algorithm {0:?} needs {1}")]
    MissingKey(Algorithm, &'static str),
    #[error("failed to read key file {path}: {source}")]
    KeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid verification key: {0}")]
    Key(#[from] jsonwebtoken::errors::Error),
    #[error("invalid claim header name '{0}'")]
    HeaderName(String),
}

#[derive(Clone)]
pub struct JwtGate {
    key: DecodingKey,
    validation: Validation,
    required_claims: Vec<String>,
    propagate: Vec<(String, HeaderName)>,
}

impl std::fmt::Debug for JwtGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtGate")
            .field("algorithms", &self.validation.algorithms)
            .field("required_claims", &self.required_claims)
            .finish_non_exhaustive()
    }
}

impl JwtGate {
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthSetupError> {
        let algorithm = Algorithm::from_str(config.algorithm.trim())
            .map_err(|_| AuthSetupError::Algorithm(config.algorithm.clone()))?;
        let key = decoding_key(algorithm, config)?;

        let mut validation = Validation::new(algorithm);
        validation.leeway = config.leeway_secs;
        validation.set_required_spec_claims(&["exp"]);
        match &config.issuer {
            Some(issuer) => validation.set_issuer(&[issuer]),
            None => validation.iss = None,
        }
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let propagate = config
            .propagate_claims
            .iter()
            .map(|p| {
                HeaderName::from_bytes(p.header.to_ascii_lowercase().as_bytes())
                    .map(|h| (p.claim.clone(), h))
                    .map_err(|_| AuthSetupError::HeaderName(p.header.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            key,
            validation,
            required_claims: config.required_claims.clone(),
            propagate,
        })
    }

    /// Verify a raw token and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, String> {
        let data = decode::<Map<String, Value>>(token, &self.key, &self.validation)
            .map_err(|e| e.to_string())?;

        if let Some(missing) = self
            .required_claims
            .iter()
            .find(|c| data.claims.get(c.as_str()).map_or(true, Value::is_null))
        {
            return Err(format!("missing required claim '{}'", missing));
        }
        Ok(Claims(data.claims))
    }

    fn propagate(&self, claims: &Claims, headers: &mut HeaderMap) {
        for (claim, header) in &self.propagate {
            headers.remove(header);
            let value = match claims.get(claim) {
                Some(Value::String(s)) => HeaderValue::from_str(s).ok(),
                Some(Value::Null) | None => None,
                Some(other) => HeaderValue::from_str(&other.to_string()).ok(),
            };
            if let Some(value) = value {
                headers.insert(header.clone(), value);
            }
        }
    }
}

fn decoding_key(algorithm: Algorithm, config: &AuthConfig) -> Result<DecodingKey, AuthSetupError> {
    use Algorithm::*;

    if matches!(algorithm, HS256 | HS384 | HS512) {
        return match &config.secret {
            Some(secret) if !secret.is_empty() => Ok(DecodingKey::from_secret(secret.as_bytes())),
            _ => Err(AuthSetupError::MissingKey(algorithm, "a shared secret")),
        };
    }

    let pem = match (&config.public_key_pem, &config.public_key_path) {
        (Some(pem), _) => pem.as_bytes().to_vec(),
        (None, Some(path)) => std::fs::read(path).map_err(|source| AuthSetupError::KeyFile {
            path: path.clone(),
            source,
        })?,
        (None, None) => return Err(AuthSetupError::MissingKey(algorithm, "a PEM public key")),
    };

    let key = match algorithm {
        ES256 | ES384 => DecodingKey::from_ec_pem(&pem)?,
        EdDSA => DecodingKey::from_ed_pem(&pem)?,
        _ => DecodingKey::from_rsa_pem(&pem)?,
    };
    Ok(key)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

impl Gate for JwtGate {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn check(&self, parts: &mut Parts) -> GateDecision {
        let request_id = parts.headers.request_id().unwrap_or("unknown").to_string();

        let Some(token) = bearer_token(&parts.headers) else {
            tracing::info!(request_id = %request_id, path = %parts.uri.path(), "Missing bearer token");
            return GateDecision::Respond(unauthorized());
        };

        match self.verify(token) {
            Ok(claims) => {
                self.propagate(&claims, &mut parts.headers);
                parts.extensions.insert(claims);
                GateDecision::Continue
            }
            Err(reason) => {
                tracing::info!(
                    request_id = %request_id,
                    path = %parts.uri.path(),
                    reason = %reason,
                    "Token rejected"
                );
                GateDecision::Respond(unauthorized())
            }
        }
    }
}
