//! Per-request context: authenticated principal, path parameters, request id.

use crate::error::ApiError;
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Path},
    http::{request::Parts, HeaderMap},
};
use std::collections::HashMap;
use tower_http::request_id::RequestId;

/// Header carrying the request id. Generated by the request-id middleware when absent.
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// The authenticated caller. Placed into request extensions by the auth middleware.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub role: String,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: impl Into<String>) -> Self {
        Principal {
            id: id.into(),
            role: role.into(),
        }
    }
}

/// What handlers and hooks get to see about the request.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    principal: Option<Principal>,
    params: HashMap<String, String>,
    request_id: Option<String>,
    headers: HeaderMap,
}

impl RequestContext {
    pub fn new(principal: Option<Principal>) -> Self {
        RequestContext {
            principal,
            ..Default::default()
        }
    }

    pub fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Principal id; `None` when unauthenticated or when the id is empty.
    pub fn user_id(&self) -> Option<&str> {
        self.principal
            .as_ref()
            .map(|p| p.id.as_str())
            .filter(|id| !id.is_empty())
    }

    pub fn role(&self) -> Option<&str> {
        self.principal.as_ref().map(|p| p.role.as_str())
    }

    /// Path parameter by name, e.g. `id` for `/users/:id/ban`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let params = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map(|Path(p)| p)
            .unwrap_or_default();
        let request_id = parts
            .extensions
            .get::<RequestId>()
            .map(RequestId::header_value)
            .or_else(|| parts.headers.get(REQUEST_ID_HEADER))
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(RequestContext {
            principal: parts.extensions.get::<Principal>().cloned(),
            params,
            request_id,
            headers: parts.headers.clone(),
        })
    }
}

/// Extractor for handlers that need an authenticated caller; rejects with a 401 envelope.
#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .filter(|p| !p.id.is_empty())
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("unauthorized"))
    }
}
