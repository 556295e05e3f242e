//! Common routes: health, readiness, version.

use crate::error::ApiError;
use crate::response::{self, Envelope};
use crate::store::Db;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Serialize)]
struct VersionBody {
    name: &'static str,
    version: &'static str,
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": 1 }))
}

async fn ready(State(db): State<Db>) -> Result<Envelope, ApiError> {
    db.ping()
        .await
        .map_err(|e| ApiError::internal("database unavailable", e))?;
    Ok(response::ok(json!({ "database": "ok" })))
}

async fn version() -> Envelope {
    response::ok(VersionBody {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /health, GET /ready (storage ping), GET /version.
pub fn common_routes(db: Db) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/version", get(version))
        .with_state(db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn get_json(app: Router, uri: &str) -> Value {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_ready_and_version() {
        let app = common_routes(Arc::new(InMemoryStore::new()));
        assert_eq!(get_json(app.clone(), "/health").await, json!({"ok": 1}));

        let ready = get_json(app.clone(), "/ready").await;
        assert_eq!(ready["code"], 0);
        assert_eq!(ready["data"], json!({"database": "ok"}));

        let version = get_json(app, "/version").await;
        assert_eq!(version["data"]["name"], "ezkit");
    }
}
