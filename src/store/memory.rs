//! In-memory store for tests and development.
//!
//! Tables are vectors of JSON rows behind one async mutex. A transaction holds that
//! mutex until it finishes, so transactions are serialized with every other caller;
//! rollback (explicit or on drop) restores the snapshot taken at `begin`.

use super::{Condition, Db, Filter, Query, Row, Store, Transaction};
use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Tables = HashMap<String, Vec<Row>>;
type UniqueSets = HashMap<String, Vec<Vec<String>>>;

#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    unique: Arc<UniqueSets>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a unique constraint over `columns` of `table`. Rows with a null in any
    /// of the columns never conflict.
    pub fn with_unique<C: Into<String>>(mut self, table: &str, columns: impl IntoIterator<Item = C>) -> Self {
        Arc::make_mut(&mut self.unique)
            .entry(table.to_string())
            .or_default()
            .push(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Snapshot of a table's rows, in insertion order.
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.tables.lock().await.get(table).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn count(&self, table: &str, filter: &Filter) -> Result<u64, StoreError> {
        Ok(count(&*self.tables.lock().await, table, filter))
    }

    async fn find(&self, table: &str, query: &Query) -> Result<Vec<Row>, StoreError> {
        Ok(find(&*self.tables.lock().await, table, query))
    }

    async fn first(&self, table: &str, filter: &Filter) -> Result<Row, StoreError> {
        first(&*self.tables.lock().await, table, filter)
    }

    async fn insert(&self, table: &str, row: &Row) -> Result<Row, StoreError> {
        insert(&mut *self.tables.lock().await, &self.unique, table, row)
    }

    async fn update(&self, table: &str, filter: &Filter, changes: &Row) -> Result<u64, StoreError> {
        update(&mut *self.tables.lock().await, &self.unique, table, filter, changes)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64, StoreError> {
        Ok(delete(&mut *self.tables.lock().await, table, filter))
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        let guard = self.tables.clone().lock_owned().await;
        let snapshot = guard.clone();
        Ok(Box::new(MemoryTransaction {
            inner: Arc::new(TxStore {
                slot: std::sync::Mutex::new(Some(Open { guard, snapshot })),
                unique: self.unique.clone(),
            }),
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

struct Open {
    guard: OwnedMutexGuard<Tables>,
    snapshot: Tables,
}

struct TxStore {
    slot: std::sync::Mutex<Option<Open>>,
    unique: Arc<UniqueSets>,
}

impl TxStore {
    fn with_tables<R>(&self, f: impl FnOnce(&mut Tables) -> Result<R, StoreError>) -> Result<R, StoreError> {
        let mut slot = self.slot.lock().map_err(|_| StoreError::Closed)?;
        let open = slot.as_mut().ok_or(StoreError::Closed)?;
        f(&mut *open.guard)
    }

    fn finish(&self, keep: bool) -> Result<(), StoreError> {
        let mut slot = self.slot.lock().map_err(|_| StoreError::Closed)?;
        let Open { mut guard, snapshot } = slot.take().ok_or(StoreError::Closed)?;
        if !keep {
            *guard = snapshot;
        }
        Ok(())
    }
}

impl Drop for TxStore {
    fn drop(&mut self) {
        if let Ok(slot) = self.slot.get_mut() {
            if let Some(Open { mut guard, snapshot }) = slot.take() {
                tracing::debug!("in-memory transaction dropped unfinished; rolling back");
                *guard = snapshot;
            }
        }
    }
}

#[async_trait]
impl Store for TxStore {
    async fn count(&self, table: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.with_tables(|t| Ok(count(t, table, filter)))
    }

    async fn find(&self, table: &str, query: &Query) -> Result<Vec<Row>, StoreError> {
        self.with_tables(|t| Ok(find(t, table, query)))
    }

    async fn first(&self, table: &str, filter: &Filter) -> Result<Row, StoreError> {
        self.with_tables(|t| first(t, table, filter))
    }

    async fn insert(&self, table: &str, row: &Row) -> Result<Row, StoreError> {
        self.with_tables(|t| insert(t, &self.unique, table, row))
    }

    async fn update(&self, table: &str, filter: &Filter, changes: &Row) -> Result<u64, StoreError> {
        self.with_tables(|t| update(t, &self.unique, table, filter, changes))
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.with_tables(|t| Ok(delete(t, table, filter)))
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        Err(StoreError::NestedTransaction)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.with_tables(|_| Ok(()))
    }
}

struct MemoryTransaction {
    inner: Arc<TxStore>,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    fn store(&self) -> Db {
        self.inner.clone()
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.finish(true)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.finish(false)
    }
}

fn matches(row: &Row, filter: &Filter) -> bool {
    filter.conditions.iter().all(|cond| match cond {
        Condition::Eq(col, val) => row.get(col).unwrap_or(&Value::Null) == val,
        Condition::Contains { columns, needle } => {
            let needle = needle.to_lowercase();
            columns.iter().any(|c| match row.get(c) {
                Some(Value::String(s)) => s.to_lowercase().contains(&needle),
                Some(Value::Null) | None => false,
                Some(other) => other.to_string().to_lowercase().contains(&needle),
            })
        }
    })
}

fn rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order used for sorting: nulls first, then by type, then by value.
fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ if rank(a) == rank(b) => a.to_string().cmp(&b.to_string()),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn count(tables: &Tables, table: &str, filter: &Filter) -> u64 {
    tables
        .get(table)
        .map(|rows| rows.iter().filter(|r| matches(r, filter)).count() as u64)
        .unwrap_or(0)
}

fn find(tables: &Tables, table: &str, query: &Query) -> Vec<Row> {
    let Some(rows) = tables.get(table) else {
        return Vec::new();
    };
    let mut hits: Vec<&Row> = rows.iter().filter(|r| matches(r, &query.filter)).collect();
    if !query.order.is_empty() {
        hits.sort_by(|a, b| {
            query
                .order
                .iter()
                .map(|o| {
                    let ord = compare(
                        a.get(&o.column).unwrap_or(&Value::Null),
                        b.get(&o.column).unwrap_or(&Value::Null),
                    );
                    if o.desc {
                        ord.reverse()
                    } else {
                        ord
                    }
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }
    let offset = query.offset.unwrap_or(0) as usize;
    let limit = query.limit.map(|n| n as usize).unwrap_or(usize::MAX);
    hits.into_iter().skip(offset).take(limit).cloned().collect()
}

fn first(tables: &Tables, table: &str, filter: &Filter) -> Result<Row, StoreError> {
    tables
        .get(table)
        .and_then(|rows| rows.iter().find(|r| matches(r, filter)))
        .cloned()
        .ok_or(StoreError::NotFound)
}

/// First row (other than `skip`) sharing every column of a unique set with `candidate`.
fn conflict(unique: &UniqueSets, table: &str, rows: &[Row], candidate: &Row, skip: Option<usize>) -> Option<String> {
    let sets = unique.get(table)?;
    for set in sets {
        let key: Option<Vec<&Value>> = set
            .iter()
            .map(|c| candidate.get(c).filter(|v| !v.is_null()))
            .collect();
        let Some(key) = key else { continue };
        let clash = rows.iter().enumerate().any(|(i, r)| {
            Some(i) != skip && set.iter().zip(&key).all(|(c, v)| r.get(c) == Some(*v))
        });
        if clash {
            return Some(format!("duplicate key on {}({})", table, set.join(", ")));
        }
    }
    None
}

fn insert(tables: &mut Tables, unique: &UniqueSets, table: &str, row: &Row) -> Result<Row, StoreError> {
    let rows = tables.entry(table.to_string()).or_default();
    if let Some(msg) = conflict(unique, table, rows, row, None) {
        return Err(StoreError::UniqueViolation(msg));
    }
    rows.push(row.clone());
    Ok(row.clone())
}

fn update(
    tables: &mut Tables,
    unique: &UniqueSets,
    table: &str,
    filter: &Filter,
    changes: &Row,
) -> Result<u64, StoreError> {
    let Some(rows) = tables.get_mut(table) else {
        return Ok(0);
    };
    let mut next = rows.clone();
    let mut touched = Vec::new();
    for (i, row) in next.iter_mut().enumerate() {
        if matches(row, filter) {
            for (k, v) in changes {
                row.insert(k.clone(), v.clone());
            }
            touched.push(i);
        }
    }
    for &i in &touched {
        if let Some(msg) = conflict(unique, table, &next, &next[i], Some(i)) {
            return Err(StoreError::UniqueViolation(msg));
        }
    }
    *rows = next;
    Ok(touched.len() as u64)
}

fn delete(tables: &mut Tables, table: &str, filter: &Filter) -> u64 {
    let Some(rows) = tables.get_mut(table) else {
        return 0;
    };
    let before = rows.len();
    rows.retain(|r| !matches(r, filter));
    (before - rows.len()) as u64
}
