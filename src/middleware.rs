//! Transport middleware shared by the API and admin listeners.

use crate::config::LimitsConfig;
use crate::error::ApiError;
use crate::response::{self, CODE_BAD_REQUEST, CODE_SERVER_ERROR, CODE_TIMEOUT};
use axum::{
    extract::{rejection::BytesRejection, DefaultBodyLimit, Request, State},
    http::{HeaderName, StatusCode},
    middleware::{from_fn, from_fn_with_state, Next},
    response::{IntoResponse, Response},
    Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::any::Any;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    catch_panic::CatchPanicLayer,
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

/// Lowercase form of [`crate::extractors::REQUEST_ID_HEADER`].
const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

pub const BODY_TOO_LARGE: &str = "request body too large";
pub const TOO_MANY_REQUESTS: &str = "too many requests";

/// Process-wide token bucket shared by every request through one layer stack.
pub type Limiter = Arc<DefaultDirectRateLimiter>;

/// Wrap `router` with, outermost first: request id, access log, panic recovery,
/// rate limit, timeout, concurrency limit, body size limit.
pub fn standard_layers(router: Router, limits: &LimitsConfig) -> Router {
    router
        .layer(DefaultBodyLimit::max(limits.max_body_bytes))
        .layer(RequestBodyLimitLayer::new(limits.max_body_bytes))
        .layer(from_fn(body_too_large))
        .layer(GlobalConcurrencyLimitLayer::new(limits.concurrency_limit))
        .layer(from_fn_with_state(limits.request_timeout(), timeout))
        .layer(from_fn_with_state(rate_limiter(limits), rate_limit))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request| {
            let rid = req
                .headers()
                .get(&REQUEST_ID)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("n/a");
            tracing::info_span!("http_request", method = %req.method(), uri = %req.uri().path(), request_id = %rid)
        }))
        .layer(PropagateRequestIdLayer::new(REQUEST_ID))
        .layer(SetRequestIdLayer::new(REQUEST_ID, MakeRequestUuid))
}

/// Abandon the request after `limit`. The handler future is dropped, so any open
/// transaction rolls back.
pub async fn timeout(State(limit): State<Duration>, req: Request, next: Next) -> Response {
    match tokio::time::timeout(limit, next.run(req)).await {
        Ok(resp) => resp,
        Err(_) => {
            tracing::warn!(timeout_ms = limit.as_millis() as u64, "request timed out");
            ApiError::new(CODE_TIMEOUT, "timeout").into_response()
        }
    }
}

/// Token bucket refilled at `rate_limit_rps` holding at most `rate_limit_burst`.
/// Zero values are treated as one.
pub fn rate_limiter(limits: &LimitsConfig) -> Limiter {
    let rps = NonZeroU32::new(limits.rate_limit_rps).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(limits.rate_limit_burst).unwrap_or(rps);
    Arc::new(RateLimiter::direct(Quota::per_second(rps).allow_burst(burst)))
}

pub async fn rate_limit(State(limiter): State<Limiter>, req: Request, next: Next) -> Response {
    if limiter.check().is_err() {
        tracing::warn!(path = %req.uri().path(), "rate limited");
        return response::error(CODE_SERVER_ERROR, TOO_MANY_REQUESTS).into_response();
    }
    next.run(req).await
}

/// Turn the bare 413 of an oversized body into the 400 envelope.
pub async fn body_too_large(req: Request, next: Next) -> Response {
    let resp = next.run(req).await;
    if resp.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return response::error(CODE_BAD_REQUEST, BODY_TOO_LARGE).into_response();
    }
    resp
}

/// Map a failed body read to a 400 error, naming oversized bodies as such.
pub(crate) fn body_rejection(rejection: BytesRejection) -> ApiError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::bad_request(BODY_TOO_LARGE)
    } else {
        ApiError::bad_request(rejection.body_text())
    }
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "handler panicked");
    response::error(CODE_SERVER_ERROR, "internal error").into_response()
}
