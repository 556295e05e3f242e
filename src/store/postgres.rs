//! PostgreSQL store on a sqlx pool.

use super::{Db, Filter, Query, Row, Store, Transaction};
use crate::error::StoreError;
use crate::sql::{self, ColumnInfo, PgBindValue, QueryBuf, TableInfo};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgExecutor, PgPool, Postgres};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

/// Table descriptions loaded once per table from the catalog.
struct SchemaCache {
    pool: PgPool,
    schema: String,
    tables: RwLock<HashMap<String, Arc<TableInfo>>>,
}

impl SchemaCache {
    async fn table(&self, name: &str) -> Result<Arc<TableInfo>, StoreError> {
        let cached = self.tables.read().ok().and_then(|m| m.get(name).cloned());
        if let Some(t) = cached {
            return Ok(t);
        }
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(sql::COLUMNS_SQL)
            .bind(&self.schema)
            .bind(name)
            .fetch_all(&self.pool)
            .await?;
        if rows.is_empty() {
            return Err(StoreError::UnknownTable(name.to_string()));
        }
        let info = Arc::new(TableInfo {
            schema: self.schema.clone(),
            table: name.to_string(),
            columns: rows
                .iter()
                .map(|(col, data_type, udt_schema, udt_name)| {
                    ColumnInfo::from_catalog(col, data_type, udt_schema, udt_name)
                })
                .collect(),
        });
        tracing::debug!(table = %name, columns = info.columns.len(), "loaded table info");
        if let Ok(mut m) = self.tables.write() {
            m.insert(name.to_string(), info.clone());
        }
        Ok(info)
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    cache: Arc<SchemaCache>,
}

impl PgStore {
    /// Wrap an existing pool; tables are looked up in the `public` schema.
    pub fn new(pool: PgPool) -> Self {
        Self::with_schema(pool, "public")
    }

    pub fn with_schema(pool: PgPool, schema: impl Into<String>) -> Self {
        PgStore {
            cache: Arc::new(SchemaCache {
                pool: pool.clone(),
                schema: schema.into(),
                tables: RwLock::new(HashMap::new()),
            }),
            pool,
        }
    }

    pub async fn connect(dsn: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(dsn)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn count(&self, table: &str, filter: &Filter) -> Result<u64, StoreError> {
        let t = self.cache.table(table).await?;
        fetch_count(&self.pool, &sql::count(&t, filter)?).await
    }

    async fn find(&self, table: &str, query: &Query) -> Result<Vec<Row>, StoreError> {
        let t = self.cache.table(table).await?;
        fetch_rows(&self.pool, &sql::select(&t, query)?).await
    }

    async fn first(&self, table: &str, filter: &Filter) -> Result<Row, StoreError> {
        let t = self.cache.table(table).await?;
        let q = sql::select(&t, &Query::new(filter.clone()).limit(1))?;
        fetch_optional_row(&self.pool, &q).await?.ok_or(StoreError::NotFound)
    }

    async fn insert(&self, table: &str, row: &Row) -> Result<Row, StoreError> {
        let t = self.cache.table(table).await?;
        fetch_optional_row(&self.pool, &sql::insert(&t, row))
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, table: &str, filter: &Filter, changes: &Row) -> Result<u64, StoreError> {
        let t = self.cache.table(table).await?;
        match sql::update(&t, filter, changes)? {
            Some(q) => execute(&self.pool, &q).await,
            None => fetch_count(&self.pool, &sql::count(&t, filter)?).await,
        }
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64, StoreError> {
        let t = self.cache.table(table).await?;
        execute(&self.pool, &sql::delete(&t, filter)?).await
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction {
            inner: Arc::new(PgTxStore {
                tx: Mutex::new(Some(tx)),
                cache: self.cache.clone(),
            }),
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Store view bound to one open transaction. Operations after commit/rollback fail with `Closed`.
struct PgTxStore {
    tx: Mutex<Option<sqlx::Transaction<'static, Postgres>>>,
    cache: Arc<SchemaCache>,
}

#[async_trait]
impl Store for PgTxStore {
    async fn count(&self, table: &str, filter: &Filter) -> Result<u64, StoreError> {
        let t = self.cache.table(table).await?;
        let q = sql::count(&t, filter)?;
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(StoreError::Closed)?;
        fetch_count(&mut **tx, &q).await
    }

    async fn find(&self, table: &str, query: &Query) -> Result<Vec<Row>, StoreError> {
        let t = self.cache.table(table).await?;
        let q = sql::select(&t, query)?;
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(StoreError::Closed)?;
        fetch_rows(&mut **tx, &q).await
    }

    async fn first(&self, table: &str, filter: &Filter) -> Result<Row, StoreError> {
        let t = self.cache.table(table).await?;
        let q = sql::select(&t, &Query::new(filter.clone()).limit(1))?;
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(StoreError::Closed)?;
        fetch_optional_row(&mut **tx, &q).await?.ok_or(StoreError::NotFound)
    }

    async fn insert(&self, table: &str, row: &Row) -> Result<Row, StoreError> {
        let t = self.cache.table(table).await?;
        let q = sql::insert(&t, row);
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(StoreError::Closed)?;
        fetch_optional_row(&mut **tx, &q).await?.ok_or(StoreError::NotFound)
    }

    async fn update(&self, table: &str, filter: &Filter, changes: &Row) -> Result<u64, StoreError> {
        let t = self.cache.table(table).await?;
        let update = sql::update(&t, filter, changes)?;
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(StoreError::Closed)?;
        match update {
            Some(q) => execute(&mut **tx, &q).await,
            None => fetch_count(&mut **tx, &sql::count(&t, filter)?).await,
        }
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64, StoreError> {
        let t = self.cache.table(table).await?;
        let q = sql::delete(&t, filter)?;
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(StoreError::Closed)?;
        execute(&mut **tx, &q).await
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        Err(StoreError::NestedTransaction)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(StoreError::Closed)?;
        sqlx::query("SELECT 1").execute(&mut **tx).await?;
        Ok(())
    }
}

/// Dropping the handle without commit drops the sqlx transaction, which rolls back.
struct PgTransaction {
    inner: Arc<PgTxStore>,
}

#[async_trait]
impl Transaction for PgTransaction {
    fn store(&self) -> Db {
        self.inner.clone()
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let tx = self.inner.tx.lock().await.take().ok_or(StoreError::Closed)?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let tx = self.inner.tx.lock().await.take().ok_or(StoreError::Closed)?;
        tx.rollback().await?;
        Ok(())
    }
}

fn bind_all<'q>(q: &'q QueryBuf) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(PgBindValue::from_json(p));
    }
    query
}

async fn fetch_rows<'c, E: PgExecutor<'c>>(exec: E, q: &QueryBuf) -> Result<Vec<Row>, StoreError> {
    let rows = bind_all(q).fetch_all(exec).await?;
    Ok(rows.iter().map(row_to_json).collect())
}

async fn fetch_optional_row<'c, E: PgExecutor<'c>>(exec: E, q: &QueryBuf) -> Result<Option<Row>, StoreError> {
    let row = bind_all(q).fetch_optional(exec).await?;
    Ok(row.as_ref().map(row_to_json))
}

async fn fetch_count<'c, E: PgExecutor<'c>>(exec: E, q: &QueryBuf) -> Result<u64, StoreError> {
    use sqlx::Row as _;
    let row = bind_all(q).fetch_one(exec).await?;
    let n: i64 = row.try_get(0)?;
    Ok(n.max(0) as u64)
}

async fn execute<'c, E: PgExecutor<'c>>(exec: E, q: &QueryBuf) -> Result<u64, StoreError> {
    Ok(bind_all(q).execute(exec).await?.rows_affected())
}

fn row_to_json(row: &PgRow) -> Row {
    use sqlx::{Column, Row as _};
    let mut map = Row::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    map
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row as _;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}
