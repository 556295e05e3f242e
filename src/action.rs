//! Action pipeline: declare a non-CRUD endpoint once and get authentication, input
//! binding, optional transactional execution and envelope rendering for free.
//!
//! ```rust,ignore
//! let ban = ActionBuilder::post("/users/:id/ban")
//!     .auth(true)
//!     .roles(["admin"])
//!     .transaction(true)
//!     .handle(|ctx: RequestContext, db: Db, _: ()| async move {
//!         let id = ctx.param("id").unwrap_or_default().to_string();
//!         /* ... */
//!         Ok(json!({ "id": id }))
//!     });
//! group.action(ban)
//! ```
//!
//! Stages run in a fixed order and each one can end the request:
//! authenticate (401/403), bind (400), execute, respond. The handler is never
//! invoked for a request that fails an earlier stage.

use crate::error::{ApiError, BoxError};
use crate::extractors::RequestContext;
use crate::middleware::body_rejection;
use crate::response::respond;
use crate::store::Db;
use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::Method,
    response::Response,
    routing::{on, MethodFilter},
    Router,
};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Where the handler input comes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Binder {
    /// `I::default()`; handlers read path params from the context.
    #[default]
    None,
    Json,
    Query,
}

pub type HandlerFuture<O> = Pin<Box<dyn Future<Output = Result<O, BoxError>> + Send>>;
type BoxedHandler<I, O> = Arc<dyn Fn(RequestContext, Db, I) -> HandlerFuture<O> + Send + Sync>;

/// Route-level settings of an action, before the handler is attached.
#[derive(Clone, Debug)]
pub struct ActionBuilder {
    method: Method,
    path: String,
    binder: Binder,
    auth: bool,
    roles: Vec<String>,
    transaction: bool,
}

impl ActionBuilder {
    /// `GET`, `POST`, `PUT`, `PATCH` and `DELETE` are honored (case-insensitive);
    /// anything else registers as `POST`.
    pub fn new(method: &str, path: impl Into<String>) -> Self {
        let method = match method.to_ascii_uppercase().as_str() {
            "GET" => Method::GET,
            "PUT" => Method::PUT,
            "PATCH" => Method::PATCH,
            "DELETE" => Method::DELETE,
            _ => Method::POST,
        };
        ActionBuilder {
            method,
            path: path.into(),
            binder: Binder::None,
            auth: false,
            roles: Vec::new(),
            transaction: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new("POST", path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new("PUT", path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new("DELETE", path)
    }

    pub fn bind(mut self, binder: Binder) -> Self {
        self.binder = binder;
        self
    }

    /// Require an authenticated principal.
    pub fn auth(mut self, required: bool) -> Self {
        self.auth = required;
        self
    }

    /// Restrict to principals holding one of these roles. Only checked with `auth(true)`.
    pub fn roles<R: Into<String>>(mut self, roles: impl IntoIterator<Item = R>) -> Self {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Run the handler inside a transaction committed only on success.
    pub fn transaction(mut self, enabled: bool) -> Self {
        self.transaction = enabled;
        self
    }

    pub fn handle<I, O, F, Fut>(self, handler: F) -> Action<I, O>
    where
        I: 'static,
        O: 'static,
        F: Fn(RequestContext, Db, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, BoxError>> + Send + 'static,
    {
        Action {
            route: self,
            handler: Arc::new(move |ctx: RequestContext, db: Db, input: I| -> HandlerFuture<O> {
                Box::pin(handler(ctx, db, input))
            }),
        }
    }
}

pub struct Action<I, O> {
    route: ActionBuilder,
    handler: BoxedHandler<I, O>,
}

impl<I, O> Clone for Action<I, O> {
    fn clone(&self) -> Self {
        Action {
            route: self.route.clone(),
            handler: self.handler.clone(),
        }
    }
}

impl<I, O> Action<I, O> {
    pub fn method(&self) -> &Method {
        &self.route.method
    }

    pub fn path(&self) -> &str {
        &self.route.path
    }
}

impl<I, O> Action<I, O>
where
    I: DeserializeOwned + Default + Send + 'static,
    O: Serialize + Send + 'static,
{
    /// Run every stage for one request.
    pub async fn call(&self, db: Db, req: Request) -> Response {
        let (mut parts, body) = req.into_parts();
        let ctx = match RequestContext::from_request_parts(&mut parts, &()).await {
            Ok(ctx) => ctx,
            Err(never) => match never {},
        };

        if let Err(e) = self.authorize(&ctx) {
            return respond::<()>(Err(e));
        }

        let input: I = match self.route.binder {
            Binder::None => I::default(),
            Binder::Json => {
                let bytes = match Bytes::from_request(Request::from_parts(parts, body), &()).await {
                    Ok(b) => b,
                    Err(rejection) => return respond::<()>(Err(body_rejection(rejection))),
                };
                match serde_json::from_slice(&bytes) {
                    Ok(input) => input,
                    Err(e) => return respond::<()>(Err(ApiError::bad_request(e.to_string()))),
                }
            }
            Binder::Query => match Query::<I>::try_from_uri(&parts.uri) {
                Ok(Query(input)) => input,
                Err(rejection) => return respond::<()>(Err(ApiError::bad_request(rejection.body_text()))),
            },
        };

        respond(self.execute(ctx, db, input).await)
    }

    fn authorize(&self, ctx: &RequestContext) -> Result<(), ApiError> {
        if !self.route.auth {
            return Ok(());
        }
        if ctx.user_id().is_none() {
            return Err(ApiError::unauthorized("unauthorized"));
        }
        if !self.route.roles.is_empty() {
            let role = ctx.role().unwrap_or_default();
            if !self.route.roles.iter().any(|r| r == role) {
                return Err(ApiError::forbidden("forbidden"));
            }
        }
        Ok(())
    }

    async fn execute(&self, ctx: RequestContext, db: Db, input: I) -> Result<O, ApiError> {
        if !self.route.transaction {
            return (self.handler)(ctx, db, input).await.map_err(ApiError::from_boxed);
        }

        // Dropping `tx` (request cancelled or timed out) rolls back.
        let tx = db
            .begin()
            .await
            .map_err(|e| ApiError::internal("begin transaction failed", e))?;
        match (self.handler)(ctx, tx.store(), input).await {
            Ok(out) => {
                tx.commit()
                    .await
                    .map_err(|e| ApiError::internal("commit transaction failed", e))?;
                Ok(out)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    tracing::warn!(path = %self.route.path, error = %rb, "rollback failed");
                }
                Err(ApiError::from_boxed(e))
            }
        }
    }
}

fn method_filter(method: &Method) -> MethodFilter {
    if method == Method::GET {
        MethodFilter::GET
    } else if method == Method::PUT {
        MethodFilter::PUT
    } else if method == Method::PATCH {
        MethodFilter::PATCH
    } else if method == Method::DELETE {
        MethodFilter::DELETE
    } else {
        MethodFilter::POST
    }
}

pub(crate) fn mount<I, O>(router: Router, db: Db, action: Action<I, O>) -> Router
where
    I: DeserializeOwned + Default + Send + 'static,
    O: Serialize + Send + 'static,
{
    let filter = method_filter(action.method());
    let path = action.path().to_string();
    tracing::info!(method = %action.method(), path = %path, auth = action.route.auth, "mounted action");
    let action = Arc::new(action);
    router.route(
        &path,
        on(filter, move |req: Request| async move { action.call(db, req).await }),
    )
}
