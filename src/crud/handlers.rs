//! The five generated endpoints.

use super::{CrudConfig, Operations};
use crate::case::to_snake_case;
use crate::error::ApiError;
use crate::extractors::RequestContext;
use crate::field::{self, FieldCandidates};
use crate::resource::Resource;
use crate::response::respond;
use crate::store::{self, Db, Filter, Order, Query, Records, Row};
use crate::middleware::body_rejection;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Query as QueryParams},
    http::Uri,
    routing::{delete, get, post, put},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

const DEFAULT_PAGE_SIZE: u64 = 20;
const MAX_PAGE_SIZE: u64 = 100;

struct Crud<T> {
    cfg: CrudConfig<T>,
    records: Records<T>,
    ids: FieldCandidates,
    owners: FieldCandidates,
    id_column: Option<&'static str>,
    owner_column: Option<&'static str>,
}

#[derive(Serialize)]
struct Page<T> {
    list: Vec<T>,
    total: u64,
    page: u64,
    size: u64,
}

/// Register the enabled operations under `path` and `path/:id`.
pub(crate) fn mount<T: Resource>(mut router: Router, db: Db, path: &str, cfg: CrudConfig<T>) -> Router {
    let ids = FieldCandidates::identity(cfg.id_field.as_deref());
    let owners = FieldCandidates::owner(cfg.owner_field.as_deref());
    let id_column = field::resolve_name::<T>(&ids);
    let owner_column = field::resolve_name::<T>(&owners);
    if id_column.is_none() {
        tracing::warn!(table = T::TABLE, candidates = ?ids.names(), "no identity field; requests will be rejected");
    }
    if owner_column.is_none() {
        tracing::warn!(table = T::TABLE, candidates = ?owners.names(), "no owner field; requests will be rejected");
    }

    let ops: Operations = cfg.operations.effective();
    let crud = Arc::new(Crud {
        cfg,
        records: Records::new(db),
        ids,
        owners,
        id_column,
        owner_column,
    });
    let item_path = format!("{}/:id", path.trim_end_matches('/'));

    if ops.create {
        let c = crud.clone();
        router = router.route(
            path,
            post(move |ctx: RequestContext, body: Result<Bytes, BytesRejection>| async move {
                respond(c.create(ctx, body).await)
            }),
        );
    }
    if ops.list {
        let c = crud.clone();
        router = router.route(
            path,
            get(move |ctx: RequestContext, uri: Uri| async move { respond(c.list(ctx, uri).await) }),
        );
    }
    if ops.get {
        let c = crud.clone();
        router = router.route(
            &item_path,
            get(move |ctx: RequestContext| async move { respond(c.get(ctx).await) }),
        );
    }
    if ops.update {
        let c = crud.clone();
        router = router.route(
            &item_path,
            put(move |ctx: RequestContext, body: Result<Bytes, BytesRejection>| async move {
                respond(c.update(ctx, body).await)
            }),
        );
    }
    if ops.delete {
        let c = crud.clone();
        router = router.route(
            &item_path,
            delete(move |ctx: RequestContext| async move { respond(c.delete(ctx).await) }),
        );
    }
    tracing::info!(table = T::TABLE, path = %path, ?ops, "mounted crud resource");
    router
}

fn require_user(ctx: &RequestContext) -> Result<String, ApiError> {
    ctx.user_id()
        .map(str::to_string)
        .ok_or_else(|| ApiError::unauthorized("unauthorized"))
}

/// Parse a positive integer, falling back to `default` for anything else.
fn positive_or(raw: Option<&String>, default: u64) -> u64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n > 0)
        .map(|n| n as u64)
        .unwrap_or(default)
}

impl<T: Resource> Crud<T> {
    fn id_column(&self) -> Result<&'static str, ApiError> {
        self.id_column
            .ok_or_else(|| ApiError::bad_request("id field not found"))
    }

    fn owner_column(&self) -> Result<&'static str, ApiError> {
        self.owner_column
            .ok_or_else(|| ApiError::bad_request("owner field not found"))
    }

    /// Identity from the path AND owner = caller.
    fn scoped_filter(&self, ctx: &RequestContext, uid: &str) -> Result<(String, Filter), ApiError> {
        let id = ctx.param("id").unwrap_or_default().to_string();
        let filter = Filter::new()
            .eq(self.id_column()?, id.as_str())
            .eq(self.owner_column()?, uid);
        Ok((id, filter))
    }

    fn zero_row(&self) -> Result<Row, ApiError> {
        store::encode(&(self.cfg.constructor)()).map_err(|e| ApiError::internal("record encoding failed", e))
    }

    /// Overlay the JSON object body onto a fresh zero value.
    fn bind(&self, body: &[u8]) -> Result<T, ApiError> {
        let input: Value = serde_json::from_slice(body).map_err(|e| ApiError::bad_request(e.to_string()))?;
        let Value::Object(fields) = input else {
            return Err(ApiError::bad_request("body must be a JSON object"));
        };
        let mut row = self.zero_row()?;
        row.extend(fields);
        serde_json::from_value(Value::Object(row)).map_err(|e| ApiError::bad_request(e.to_string()))
    }

    fn after_get(&self, ctx: &RequestContext, record: &mut T) {
        if let Some(hook) = &self.cfg.hooks.after_get {
            hook(ctx, record);
        }
    }

    async fn create(&self, ctx: RequestContext, body: Result<Bytes, BytesRejection>) -> Result<T, ApiError> {
        let uid = require_user(&ctx)?;
        let mut record = self.bind(&body.map_err(body_rejection)?)?;

        let id = field::locate(&mut record, &self.ids).ok_or_else(|| ApiError::bad_request("id field not found"))?;
        if id.value.trim().is_empty() {
            if !self.cfg.auto_id {
                return Err(ApiError::bad_request("id is required"));
            }
            *id.value = (self.cfg.id_generator)();
        }
        if !field::write(&mut record, &self.owners, uid) {
            return Err(ApiError::bad_request("owner field not found"));
        }
        if let Some(hook) = &self.cfg.hooks.before_create {
            hook(&ctx, &mut record).map_err(|e| ApiError::bad_request(e.to_string()))?;
        }

        let mut stored = self
            .records
            .insert(&record)
            .await
            .map_err(|e| ApiError::bad_request(e.to_string()).with_cause(e))?;
        self.after_get(&ctx, &mut stored);
        Ok(stored)
    }

    async fn list(&self, ctx: RequestContext, uri: Uri) -> Result<Page<T>, ApiError> {
        let uid = require_user(&ctx)?;
        let params = QueryParams::<HashMap<String, String>>::try_from_uri(&uri)
            .map(|q| q.0)
            .unwrap_or_default();
        let page = positive_or(params.get("page"), 1);
        let size = match positive_or(params.get("size"), DEFAULT_PAGE_SIZE) {
            n if n > MAX_PAGE_SIZE => DEFAULT_PAGE_SIZE,
            n => n,
        };
        let offset = (page - 1).saturating_mul(size);

        let mut query = Query::new(Filter::new().eq(self.owner_column()?, uid));
        if let Some(scope) = &self.cfg.hooks.scope_list {
            query = scope(&ctx, query);
        }
        let total = self.records.count(&query.filter).await?;

        let order = match &self.cfg.default_order {
            Some(order) => order.clone(),
            None => {
                let column = to_snake_case(self.id_column.unwrap_or("id"));
                Order::desc(if column.is_empty() { "id".to_string() } else { column })
            }
        };
        let query = query.order_by(order).limit(size).offset(offset);
        let mut list = self.records.find(&query).await?;
        for item in &mut list {
            self.after_get(&ctx, item);
        }
        Ok(Page {
            list,
            total,
            page,
            size,
        })
    }

    async fn get(&self, ctx: RequestContext) -> Result<T, ApiError> {
        let uid = require_user(&ctx)?;
        let (_, filter) = self.scoped_filter(&ctx, &uid)?;
        let mut record = self.records.first(&filter).await?;
        self.after_get(&ctx, &mut record);
        Ok(record)
    }

    async fn update(&self, ctx: RequestContext, body: Result<Bytes, BytesRejection>) -> Result<Value, ApiError> {
        let uid = require_user(&ctx)?;
        let (id, filter) = self.scoped_filter(&ctx, &uid)?;
        self.records.first(&filter).await?;

        let mut input = self.bind(&body.map_err(body_rejection)?)?;
        field::write(&mut input, &self.ids, id.as_str());
        field::write(&mut input, &self.owners, uid);
        if let Some(hook) = &self.cfg.hooks.before_update {
            hook(&ctx, &mut input).map_err(|e| ApiError::bad_request(e.to_string()))?;
        }

        // Only fields that differ from the zero value are written; identity never is.
        let zero = self.zero_row()?;
        let id_column = self.id_column()?;
        let changes: Row = store::encode(&input)
            .map_err(|e| ApiError::internal("record encoding failed", e))?
            .into_iter()
            .filter(|(k, v)| k != id_column && zero.get(k) != Some(v))
            .collect();
        let affected = self
            .records
            .update(&filter, &changes)
            .await
            .map_err(|e| ApiError::bad_request(e.to_string()).with_cause(e))?;
        // The record left the caller's scope between the lookup and the write.
        if affected == 0 {
            return Err(ApiError::not_found("not found"));
        }
        self.after_get(&ctx, &mut input);
        Ok(json!({ "id": id }))
    }

    async fn delete(&self, ctx: RequestContext) -> Result<Value, ApiError> {
        let uid = require_user(&ctx)?;
        let (id, filter) = self.scoped_filter(&ctx, &uid)?;
        match self.records.delete(&filter).await? {
            0 => Err(ApiError::not_found("not found")),
            _ => Ok(json!({ "id": id })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_numbers_fall_back_on_garbage() {
        assert_eq!(positive_or(Some(&"3".to_string()), 1), 3);
        assert_eq!(positive_or(Some(&"0".to_string()), 1), 1);
        assert_eq!(positive_or(Some(&"-2".to_string()), 1), 1);
        assert_eq!(positive_or(Some(&"abc".to_string()), 20), 20);
        assert_eq!(positive_or(None, 20), 20);
    }
}
