#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header::AUTHORIZATION, Method, Request, StatusCode},
    middleware::from_fn_with_state,
    Router,
};
use ezkit::{authenticate, JwtKeys, RouteGroup, SharedVerifier, TokenIssuer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const SECRET: &str = "test-secret";
pub const ISSUER: &str = "ezkit-test";

pub fn keys() -> Arc<JwtKeys> {
    Arc::new(JwtKeys::new(SECRET, ISSUER, chrono::Duration::minutes(30)))
}

pub fn token(uid: &str, role: &str) -> String {
    keys().issue(uid, role).expect("issue test token")
}

/// The group's routes behind the optional-auth middleware.
pub fn app(group: RouteGroup) -> Router {
    let verifier: SharedVerifier = keys();
    group.into_router().layer(from_fn_with_state(verifier, authenticate))
}

/// Send a request and return the decoded envelope. Fails unless transport status is 200.
pub async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Value {
    let (status, value) = call_raw(app, method, uri, token, body.map(|b| b.to_string())).await;
    assert_eq!(status, StatusCode::OK, "transport status for {uri}");
    value
}

pub async fn call_raw(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<String>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {t}"));
    }
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let req = builder.body(body.map(Body::from).unwrap_or_else(Body::empty)).unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// Owner-scoped record used across the CRUD tests.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub note: String,
    pub qty: i64,
}

ezkit::impl_resource!(Item, "items", [id, owner_id, name, note]);

pub fn item(id: &str, owner: &str, name: &str) -> Item {
    Item {
        id: id.into(),
        owner_id: owner.into(),
        name: name.into(),
        ..Default::default()
    }
}
