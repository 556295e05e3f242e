mod common;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use common::{app, call, call_raw, item, token, Item};
use ezkit::config::LimitsConfig;
use ezkit::store::Transaction;
use ezkit::{
    standard_layers, CrudConfig, Db, Filter, InMemoryStore, Operations, Query, Records, Row, RouteGroup, Store,
    StoreError,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn setup(cfg: CrudConfig<Item>) -> (Arc<InMemoryStore>, axum::Router) {
    let store = Arc::new(InMemoryStore::new());
    let db: Db = store.clone();
    let router = app(RouteGroup::new(db).crud("/items", cfg));
    (store, router)
}

async fn seed(store: &Arc<InMemoryStore>, items: &[Item]) {
    let db: Db = store.clone();
    let records = Records::<Item>::new(db);
    for it in items {
        records.insert(it).await.unwrap();
    }
}

#[tokio::test]
async fn create_generates_id_and_stamps_owner() {
    let (store, app) = setup(CrudConfig::new());
    let u1 = token("u1", "user");

    let body = call(&app, Method::POST, "/items", Some(&u1), Some(json!({"name": "x"}))).await;
    assert_eq!(body["code"], 0);
    let id = body["data"]["id"].as_str().unwrap();
    assert_eq!(id.len(), 32);
    assert_eq!(body["data"]["owner_id"], "u1");
    assert_eq!(body["data"]["name"], "x");

    let rows = store.rows("items").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["owner_id"], "u1");
}

#[tokio::test]
async fn create_ignores_client_supplied_owner() {
    let (_, app) = setup(CrudConfig::new());
    let u1 = token("u1", "user");
    let body = call(
        &app,
        Method::POST,
        "/items",
        Some(&u1),
        Some(json!({"name": "x", "owner_id": "u2", "id": "chosen"})),
    )
    .await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["owner_id"], "u1");
    assert_eq!(body["data"]["id"], "chosen");
}

#[tokio::test]
async fn every_operation_requires_a_principal() {
    let (_, app) = setup(CrudConfig::new());
    for (method, uri) in [
        (Method::POST, "/items"),
        (Method::GET, "/items"),
        (Method::GET, "/items/a"),
        (Method::PUT, "/items/a"),
        (Method::DELETE, "/items/a"),
    ] {
        let body = call(&app, method, uri, None, Some(json!({}))).await;
        assert_eq!(body["code"], 401, "{uri}");
        assert_eq!(body["msg"], "unauthorized");
        assert_eq!(body["data"], json!({}));
    }
}

#[tokio::test]
async fn list_pages_in_descending_id_order() {
    let (store, app) = setup(CrudConfig::new());
    let mine: Vec<Item> = (1..=12).map(|n| item(&format!("id{n:02}"), "u1", "n")).collect();
    seed(&store, &mine).await;
    seed(&store, &[item("other", "u2", "n")]).await;

    let u1 = token("u1", "user");
    let body = call(&app, Method::GET, "/items?page=2&size=5", Some(&u1), None).await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["total"], 12);
    assert_eq!(body["data"]["page"], 2);
    assert_eq!(body["data"]["size"], 5);
    let ids: Vec<&str> = body["data"]["list"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["id07", "id06", "id05", "id04", "id03"]);
}

#[tokio::test]
async fn list_size_over_limit_falls_back_to_default() {
    let (store, app) = setup(CrudConfig::new());
    let mine: Vec<Item> = (1..=25).map(|n| item(&format!("id{n:02}"), "u1", "n")).collect();
    seed(&store, &mine).await;

    let u1 = token("u1", "user");
    let body = call(&app, Method::GET, "/items?size=500&page=abc", Some(&u1), None).await;
    assert_eq!(body["data"]["size"], 20);
    assert_eq!(body["data"]["page"], 1);
    assert_eq!(body["data"]["list"].as_array().unwrap().len(), 20);
}

#[tokio::test]
async fn owners_never_see_each_other() {
    let (store, app) = setup(CrudConfig::new());
    seed(&store, &[item("a", "u1", "mine"), item("b", "u2", "theirs")]).await;
    let u1 = token("u1", "user");

    let list = call(&app, Method::GET, "/items", Some(&u1), None).await;
    assert_eq!(list["data"]["total"], 1);
    assert_eq!(list["data"]["list"][0]["id"], "a");

    let get = call(&app, Method::GET, "/items/b", Some(&u1), None).await;
    assert_eq!(get["code"], 404);
    assert_eq!(get["msg"], "not found");

    let update = call(&app, Method::PUT, "/items/b", Some(&u1), Some(json!({"name": "stolen"}))).await;
    assert_eq!(update["code"], 404);

    let delete = call(&app, Method::DELETE, "/items/b", Some(&u1), None).await;
    assert_eq!(delete["code"], 404);

    let db: Db = store.clone();
    let theirs = Records::<Item>::new(db).first(&Filter::new().eq("id", "b")).await.unwrap();
    assert_eq!(theirs.name, "theirs");
}

#[tokio::test]
async fn update_keeps_identity_owner_and_untouched_fields() {
    let (store, app) = setup(CrudConfig::new());
    let mut original = item("a", "u1", "old");
    original.note = "keep me".into();
    original.qty = 3;
    seed(&store, &[original]).await;

    let u1 = token("u1", "user");
    let body = call(
        &app,
        Method::PUT,
        "/items/a",
        Some(&u1),
        Some(json!({"name": "new", "id": "hijack", "owner_id": "u2"})),
    )
    .await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"], json!({"id": "a"}));

    let db: Db = store.clone();
    let stored = Records::<Item>::new(db).first(&Filter::new().eq("id", "a")).await.unwrap();
    assert_eq!(stored.owner_id, "u1");
    assert_eq!(stored.name, "new");
    assert_eq!(stored.note, "keep me");
    assert_eq!(stored.qty, 3);
    assert_eq!(store.rows("items").await.len(), 1);
}

#[tokio::test]
async fn update_rejects_non_object_bodies() {
    let (store, app) = setup(CrudConfig::new());
    seed(&store, &[item("a", "u1", "old")]).await;
    let u1 = token("u1", "user");
    let body = call(&app, Method::PUT, "/items/a", Some(&u1), Some(json!([1, 2]))).await;
    assert_eq!(body["code"], 400);
    assert_eq!(body["msg"], "body must be a JSON object");
}

#[tokio::test]
async fn update_runs_the_after_get_hook() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let cfg = CrudConfig::<Item>::new().after_get(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let (store, app) = setup(cfg);
    seed(&store, &[item("a", "u1", "old")]).await;
    let u1 = token("u1", "user");

    let body = call(&app, Method::PUT, "/items/a", Some(&u1), Some(json!({"name": "new"}))).await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"], json!({"id": "a"}));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn before_update_rejection_leaves_the_record_alone() {
    let cfg = CrudConfig::<Item>::new().before_update(|_, it| {
        if it.name == "forbidden" {
            return Err("name not allowed".into());
        }
        Ok(())
    });
    let (store, app) = setup(cfg);
    seed(&store, &[item("a", "u1", "old")]).await;
    let u1 = token("u1", "user");

    let body = call(&app, Method::PUT, "/items/a", Some(&u1), Some(json!({"name": "forbidden"}))).await;
    assert_eq!(body["code"], 400);
    assert_eq!(body["msg"], "name not allowed");

    let db: Db = store.clone();
    let stored = Records::<Item>::new(db).first(&Filter::new().eq("id", "a")).await.unwrap();
    assert_eq!(stored.name, "old");
}

/// Finds records but never manages to write them, as when ownership moves between
/// the lookup and the update.
struct VanishingStore {
    inner: Arc<InMemoryStore>,
}

#[async_trait]
impl Store for VanishingStore {
    async fn count(&self, table: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.inner.count(table, filter).await
    }

    async fn find(&self, table: &str, query: &Query) -> Result<Vec<Row>, StoreError> {
        self.inner.find(table, query).await
    }

    async fn first(&self, table: &str, filter: &Filter) -> Result<Row, StoreError> {
        self.inner.first(table, filter).await
    }

    async fn insert(&self, table: &str, row: &Row) -> Result<Row, StoreError> {
        self.inner.insert(table, row).await
    }

    async fn update(&self, _table: &str, _filter: &Filter, _changes: &Row) -> Result<u64, StoreError> {
        Ok(0)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.inner.delete(table, filter).await
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        self.inner.begin().await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn update_that_writes_nothing_is_not_found() {
    let inner = Arc::new(InMemoryStore::new());
    seed(&inner, &[item("a", "u1", "old")]).await;
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let cfg = CrudConfig::<Item>::new().after_get(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let db: Db = Arc::new(VanishingStore { inner });
    let app = app(RouteGroup::new(db).crud("/items", cfg));
    let u1 = token("u1", "user");

    let body = call(&app, Method::PUT, "/items/a", Some(&u1), Some(json!({"name": "new"}))).await;
    assert_eq!(body["code"], 404);
    assert_eq!(body["msg"], "not found");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn concurrent_deletes_succeed_at_most_once() {
    let (store, app) = setup(CrudConfig::new());
    seed(&store, &[item("a", "u1", "x")]).await;
    let u1 = token("u1", "user");

    let (left, right) = tokio::join!(
        call(&app, Method::DELETE, "/items/a", Some(&u1), None),
        call(&app, Method::DELETE, "/items/a", Some(&u1), None),
    );
    let mut codes = vec![left["code"].as_i64().unwrap(), right["code"].as_i64().unwrap()];
    codes.sort();
    assert_eq!(codes, vec![0, 404]);
    assert!(store.rows("items").await.is_empty());
}

#[tokio::test]
async fn bodies_follow_the_configured_size_limit() {
    let store = Arc::new(InMemoryStore::new());
    let db: Db = store.clone();
    let u1 = token("u1", "user");
    // Past axum's built-in 2 MiB cap, within the default configured limit.
    let big = json!({"name": "x".repeat(3 << 20)}).to_string();

    let routes = |db: Db| app(RouteGroup::new(db).crud("/items", CrudConfig::<Item>::new()));

    let roomy = standard_layers(routes(db.clone()), &LimitsConfig::default());
    let (status, body) = call_raw(&roomy, Method::POST, "/items", Some(&u1), Some(big.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);

    let tight = LimitsConfig {
        max_body_bytes: 1 << 20,
        ..LimitsConfig::default()
    };
    let cramped = standard_layers(routes(db), &tight);
    let (status, body) = call_raw(&cramped, Method::POST, "/items", Some(&u1), Some(big)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 400);
    assert_eq!(body["msg"], "request body too large");
    assert_eq!(store.rows("items").await.len(), 1);
}

#[tokio::test]
async fn delete_removes_once() {
    let (store, app) = setup(CrudConfig::new());
    seed(&store, &[item("a", "u1", "x")]).await;
    let u1 = token("u1", "user");

    let first = call(&app, Method::DELETE, "/items/a", Some(&u1), None).await;
    assert_eq!(first["code"], 0);
    assert_eq!(first["data"]["id"], "a");
    let second = call(&app, Method::DELETE, "/items/a", Some(&u1), None).await;
    assert_eq!(second["code"], 404);
    assert!(store.rows("items").await.is_empty());
}

#[tokio::test]
async fn only_enabled_operations_are_routed() {
    let (_, app) = setup(CrudConfig::new().operations(Operations {
        list: true,
        ..Default::default()
    }));
    let u1 = token("u1", "user");

    let list = call(&app, Method::GET, "/items", Some(&u1), None).await;
    assert_eq!(list["code"], 0);

    let (status, _) = call_raw(&app, Method::POST, "/items", Some(&u1), Some("{}".into())).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    let (status, _) = call_raw(&app, Method::GET, "/items/a", Some(&u1), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn hook_rejection_is_a_bad_request_and_stores_nothing() {
    let cfg = CrudConfig::<Item>::new().before_create(|_, it| {
        if it.name.is_empty() {
            return Err("name is required".into());
        }
        Ok(())
    });
    let (store, app) = setup(cfg);
    let u1 = token("u1", "user");

    let body = call(&app, Method::POST, "/items", Some(&u1), Some(json!({"note": "n"}))).await;
    assert_eq!(body["code"], 400);
    assert_eq!(body["msg"], "name is required");
    assert!(store.rows("items").await.is_empty());
}

#[tokio::test]
async fn auto_id_off_requires_client_id() {
    let (_, app) = setup(CrudConfig::new().auto_id(false));
    let u1 = token("u1", "user");

    let missing = call(&app, Method::POST, "/items", Some(&u1), Some(json!({"name": "x"}))).await;
    assert_eq!(missing["code"], 400);
    assert_eq!(missing["msg"], "id is required");

    let given = call(&app, Method::POST, "/items", Some(&u1), Some(json!({"id": "k1", "name": "x"}))).await;
    assert_eq!(given["code"], 0);
    assert_eq!(given["data"]["id"], "k1");
}

#[tokio::test]
async fn custom_generator_scope_and_after_get_hooks_apply() {
    let cfg = CrudConfig::<Item>::new()
        .id_generator(|| "fixed".to_string())
        .scope_list(|_, q| q.and(ezkit::store::Condition::Eq("name".into(), json!("keep"))))
        .after_get(|_, it| it.note = "seen".into());
    let (store, app) = setup(cfg);
    seed(&store, &[item("a", "u1", "keep"), item("b", "u1", "drop")]).await;
    let u1 = token("u1", "user");

    let created = call(&app, Method::POST, "/items", Some(&u1), Some(json!({"name": "new"}))).await;
    assert_eq!(created["data"]["id"], "fixed");
    assert_eq!(created["data"]["note"], "seen");

    let list = call(&app, Method::GET, "/items", Some(&u1), None).await;
    assert_eq!(list["data"]["total"], 1);
    assert_eq!(list["data"]["list"][0]["id"], "a");
    assert_eq!(list["data"]["list"][0]["note"], "seen");
}
