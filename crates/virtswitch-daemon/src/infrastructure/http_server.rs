//! The control-plane HTTP endpoint.
//!
//! A single route: `POST /switch` with JSON body `{"to": "host" | "guest"}`.
//! When security is enabled the request must carry the shared secret in the
//! `X-Secret` header; the comparison is constant-time.
//!
//! Response contract (reproduced faithfully from the original protocol):
//!
//! - `403` — security enabled and the secret header is missing or wrong.
//!   The body is never inspected in this case.
//! - `400` — missing/non-JSON body, or a `to` value other than
//!   `"host"`/`"guest"`.
//! - `200` with `{"success": true, "error": null}` — transition completed.
//! - `200` with `{"success": true, "error": "<diagnostic text>"}` — the
//!   transition *failed*.  `success` stays `true` at the HTTP layer; a
//!   non-null `error` field is the only failure signal.  Callers must check
//!   `error`, not the status code.
//!
//! Transitions are serialized: the service sits behind an async mutex, so a
//! second request blocks until the in-flight transition finishes.  There is
//! no cancellation.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::application::SwitchService;
use crate::domain::config::SecurityConfig;
use crate::domain::Direction;

/// Header carrying the shared secret.
pub const SECRET_HEADER: &str = "x-secret";

/// Everything a request handler needs, constructed once at startup.
#[derive(Clone)]
pub struct AppState {
    security: Arc<SecurityConfig>,
    service: Arc<Mutex<SwitchService>>,
}

impl AppState {
    pub fn new(security: SecurityConfig, service: SwitchService) -> Self {
        Self {
            security: Arc::new(security),
            service: Arc::new(Mutex::new(service)),
        }
    }
}

/// The request body.
#[derive(Debug, Deserialize)]
struct SwitchRequest {
    to: Direction,
}

/// The response body.  See the module docs for the `success`/`error`
/// semantics.
#[derive(Debug, Serialize)]
struct SwitchResponse {
    success: bool,
    error: Option<String>,
}

/// Builds the control-plane router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/switch", post(handle_switch))
        .with_state(state)
}

/// Binds the listener and serves the control plane until the process exits.
pub async fn serve(addr: std::net::SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("control endpoint listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn handle_switch(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Authentication first; the body is untouched on failure.
    if state.security.enabled && !is_authorized(&state.security, &headers) {
        warn!("rejecting switch request with missing or wrong secret");
        return StatusCode::FORBIDDEN.into_response();
    }

    // Validation: a missing/non-JSON body or an unknown direction is a 400.
    let request: SwitchRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            warn!(%err, "rejecting malformed switch request");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    // One transition at a time; later requests queue on the mutex.
    let service = state.service.lock().await;
    let error = match service.switch(request.to).await {
        Ok(()) => None,
        Err(err) => {
            warn!(direction = request.to.as_str(), %err, "transition failed");
            Some(error_chain(&err))
        }
    };

    (StatusCode::OK, Json(SwitchResponse { success: true, error })).into_response()
}

/// Checks the secret header against the configured secret in constant time.
///
/// `ct_eq` compares without early exit on the first differing byte; a length
/// mismatch short-circuits, which leaks only the secret's length.
fn is_authorized(security: &SecurityConfig, headers: &HeaderMap) -> bool {
    use subtle::ConstantTimeEq;

    let Some(provided) = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok()) else {
        return false;
    };

    security
        .secret
        .as_bytes()
        .ct_eq(provided.as_bytes())
        .into()
}

/// Renders an error and its full source chain as one diagnostic line.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_chain_joins_sources_with_colons() {
        use crate::application::SwitchError;
        use crate::infrastructure::hypervisor::HypervisorError;

        let err = SwitchError::Hypervisor(HypervisorError::Attach("device busy".to_string()));
        assert_eq!(error_chain(&err), "device attach failed: device busy");
    }

    #[test]
    fn test_authorization_rejects_missing_header() {
        let security = SecurityConfig {
            enabled: true,
            secret: "s3cret".to_string(),
        };
        assert!(!is_authorized(&security, &HeaderMap::new()));
    }

    #[test]
    fn test_authorization_compares_exact_value() {
        let security = SecurityConfig {
            enabled: true,
            secret: "s3cret".to_string(),
        };

        let mut headers = HeaderMap::new();
        headers.insert(SECRET_HEADER, "s3cret".parse().unwrap());
        assert!(is_authorized(&security, &headers));

        headers.insert(SECRET_HEADER, "s3cret ".parse().unwrap());
        assert!(!is_authorized(&security, &headers));
    }

    #[test]
    fn test_authorization_rejects_wrong_secret_of_equal_length() {
        let security = SecurityConfig {
            enabled: true,
            secret: "s3cret".to_string(),
        };

        let mut headers = HeaderMap::new();
        headers.insert(SECRET_HEADER, "s3cres".parse().unwrap());
        assert!(!is_authorized(&security, &headers));
    }
}
