//! Bearer-token middleware. Use with `axum::middleware::from_fn_with_state`.

use super::SharedVerifier;
use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Attach the principal when a valid token is present; anonymous requests pass through.
/// Endpoints decide themselves whether a principal is required.
pub async fn authenticate(State(verifier): State<SharedVerifier>, mut req: Request, next: Next) -> Response {
    let principal = match bearer_token(req.headers()) {
        Some(token) => match verifier.verify(token) {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring invalid bearer token");
                None
            }
        },
        None => None,
    };
    if let Some(p) = principal {
        req.extensions_mut().insert(p);
    }
    next.run(req).await
}

/// State for [`require_auth`]: the verifier and an optional role every caller must hold.
#[derive(Clone)]
pub struct AuthGuard {
    pub verifier: SharedVerifier,
    pub role: Option<String>,
}

impl AuthGuard {
    pub fn new(verifier: SharedVerifier) -> Self {
        AuthGuard { verifier, role: None }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// Reject requests without a valid token (401) or without the guard's role (403).
pub async fn require_auth(State(guard): State<AuthGuard>, mut req: Request, next: Next) -> Response {
    let Some(token) = bearer_token(req.headers()) else {
        return ApiError::unauthorized("missing token").into_response();
    };
    let principal = match guard.verifier.verify(token) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "rejected bearer token");
            return ApiError::unauthorized("invalid token").into_response();
        }
    };
    if let Some(role) = &guard.role {
        if &principal.role != role {
            return ApiError::forbidden("forbidden").into_response();
        }
    }
    req.extensions_mut().insert(principal);
    next.run(req).await
}
