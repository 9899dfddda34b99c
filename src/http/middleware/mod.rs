//! Request gates.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → cors::preflight_guard (403 for preflights outside the policy)
//!     → CorsLayer (answers allowed preflights, decorates every response)
//!     → auth.rs (bearer token check, claims → extensions/headers)
//!     → endpoint handler
//! ```
//!
//! # Design Decisions
//! - Gates are plain synchronous checks over the request head, independent
//!   of the router; the axum adapter is the only router-specific piece
//! - The first early response ends the chain
//! - The CORS layer wraps the gates, so a 401 still carries CORS headers

pub mod auth;
pub mod cors;

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::request::Parts;
use axum::http::Request;
use axum::middleware::{from_fn_with_state, Next};
use axum::response::Response;
use axum::Router;

use crate::config::schema::{AuthConfig, CorsConfig};
use crate::observability::metrics;

pub use auth::{AuthSetupError, Claims, JwtGate};
pub use cors::CorsPolicy;

/// Outcome of one gate.
pub enum GateDecision {
    Continue,
    Respond(Response),
}

/// One request gate.
pub trait Gate: Send + Sync {
    fn name(&self) -> &'static str;

    /// Inspect (and possibly annotate) the request head.
    fn check(&self, parts: &mut Parts) -> GateDecision;
}

/// Cross-origin policy plus the ordered gates behind it, shared by every route.
#[derive(Clone, Default)]
pub struct GateChain {
    cors: Option<Arc<CorsPolicy>>,
    gates: Arc<[Arc<dyn Gate>]>,
}

impl GateChain {
    pub fn new(gates: Vec<Arc<dyn Gate>>) -> Self {
        Self {
            cors: None,
            gates: gates.into(),
        }
    }

    pub fn with_cors(mut self, policy: CorsPolicy) -> Self {
        self.cors = Some(Arc::new(policy));
        self
    }

    pub fn from_config(cors: &CorsConfig, auth: &AuthConfig) -> Result<Self, AuthSetupError> {
        let mut gates: Vec<Arc<dyn Gate>> = Vec::new();
        if auth.enabled {
            gates.push(Arc::new(JwtGate::from_config(auth)?));
        }

        let chain = Self::new(gates);
        Ok(if cors.enabled {
            chain.with_cors(CorsPolicy::from_config(cors))
        } else {
            chain
        })
    }

    /// Names in evaluation order.
    pub fn names(&self) -> Vec<&'static str> {
        let cors = self.cors.as_ref().map(|_| "cors");
        cors.into_iter().chain(self.gates.iter().map(|g| g.name())).collect()
    }

    /// Run the gates in order. `Err` is the early response to send instead.
    pub fn evaluate(&self, parts: &mut Parts) -> Result<(), Response> {
        for gate in self.gates.iter() {
            if let GateDecision::Respond(response) = gate.check(parts) {
                metrics::record_gate_rejection(gate.name());
                return Err(response);
            }
        }
        Ok(())
    }

    /// Wrap every route of `router`: CORS outermost, then the gates.
    pub fn wrap(self, router: Router) -> Router {
        let cors = self.cors.clone();
        let router = router.layer(from_fn_with_state(self, gate_middleware));
        match cors {
            Some(policy) => router
                .layer(policy.layer())
                .layer(from_fn_with_state(policy, cors::preflight_guard)),
            None => router,
        }
    }
}

/// Axum adapter for the gates.
pub async fn gate_middleware(
    State(chain): State<GateChain>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    match chain.evaluate(&mut parts) {
        Err(response) => response,
        Ok(()) => next.run(Request::from_parts(parts, body)).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN;
    use axum::http::{HeaderValue, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    struct Tag(&'static str);

    impl Gate for Tag {
        fn name(&self) -> &'static str {
            "tag"
        }

        fn check(&self, parts: &mut Parts) -> GateDecision {
            parts.headers.insert("x-tag", HeaderValue::from_static(self.0));
            GateDecision::Continue
        }
    }

    struct Reject;

    impl Gate for Reject {
        fn name(&self) -> &'static str {
            "reject"
        }

        fn check(&self, _parts: &mut Parts) -> GateDecision {
            GateDecision::Respond(StatusCode::UNAUTHORIZED.into_response())
        }
    }

    struct Count(Arc<AtomicUsize>);

    impl Gate for Count {
        fn name(&self) -> &'static str {
            "count"
        }

        fn check(&self, _parts: &mut Parts) -> GateDecision {
            self.0.fetch_add(1, Ordering::SeqCst);
            GateDecision::Continue
        }
    }

    fn parts() -> Parts {
        Request::builder().uri("/").body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_first_rejection_stops_chain() {
        let after = Arc::new(AtomicUsize::new(0));
        let chain = GateChain::new(vec![
            Arc::new(Tag("a")),
            Arc::new(Reject),
            Arc::new(Count(after.clone())),
        ]);

        let response = chain.evaluate(&mut parts()).unwrap_err();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(after.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_all_pass_annotates_request() {
        let count = Arc::new(AtomicUsize::new(0));
        let chain = GateChain::new(vec![Arc::new(Count(count.clone())), Arc::new(Tag("b"))]);

        let mut parts = parts();
        assert!(chain.evaluate(&mut parts).is_ok());
        assert_eq!(parts.headers.get("x-tag").unwrap(), "b");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cors_runs_before_gates_and_decorates_rejections() {
        let count = Arc::new(AtomicUsize::new(0));
        let policy = CorsPolicy::from_config(&CorsConfig {
            enabled: true,
            allow_origins: vec!["http://a.test".to_string()],
            ..Default::default()
        });
        let chain = GateChain::new(vec![Arc::new(Count(count.clone())), Arc::new(Reject)])
            .with_cors(policy);
        assert_eq!(chain.names(), vec!["cors", "count", "reject"]);

        let app = chain.wrap(Router::new().route("/", get(|| async { "ok" })));

        let preflight = Request::builder()
            .method("OPTIONS")
            .uri("/")
            .header("origin", "http://a.test")
            .header("access-control-request-method", "GET")
            .body(Body::empty())
            .unwrap();
        let res = app.clone().oneshot(preflight).await.unwrap();
        assert!(res.status().is_success());
        assert_eq!(count.load(Ordering::SeqCst), 0);

        let actual = Request::builder()
            .uri("/")
            .header("origin", "http://a.test")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(actual).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "http://a.test");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
