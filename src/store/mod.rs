//! Storage contract consumed by the CRUD generator and action handlers, plus the
//! query model and a typed facade over it.

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

use crate::case::to_snake_case;
use crate::error::StoreError;
use crate::resource::Resource;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

/// One stored row: column name -> JSON value.
pub type Row = Map<String, Value>;

/// Shared storage handle. Cheap to clone; safe to use from concurrent requests.
pub type Db = Arc<dyn Store>;

#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    /// `column = value`; a `null` value matches missing/NULL columns.
    Eq(String, Value),
    /// Case-insensitive substring match on any of the columns.
    Contains { columns: Vec<String>, needle: String },
}

/// Conjunction of conditions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Filter::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq(column.into(), value.into()));
        self
    }

    pub fn contains<C: Into<String>>(mut self, columns: impl IntoIterator<Item = C>, needle: impl Into<String>) -> Self {
        self.conditions.push(Condition::Contains {
            columns: columns.into_iter().map(Into::into).collect(),
            needle: needle.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub desc: bool,
}

impl Order {
    pub fn asc(column: impl Into<String>) -> Self {
        Order {
            column: column.into(),
            desc: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Order {
            column: column.into(),
            desc: true,
        }
    }
}

/// Parses `"CreatedAt DESC"`, `"title"` or `"title asc"`; the column is snake-cased.
impl FromStr for Order {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let column = parts.next().ok_or_else(|| "empty order expression".to_string())?;
        let desc = match parts.next().map(|d| d.to_ascii_lowercase()) {
            None => false,
            Some(d) if d == "asc" => false,
            Some(d) if d == "desc" => true,
            Some(d) => return Err(format!("invalid order direction: {}", d)),
        };
        if parts.next().is_some() {
            return Err(format!("invalid order expression: {}", s));
        }
        Ok(Order {
            column: to_snake_case(column),
            desc,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    pub filter: Filter,
    pub order: Vec<Order>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Query {
    pub fn new(filter: Filter) -> Self {
        Query {
            filter,
            ..Default::default()
        }
    }

    /// Add a condition to the filter.
    pub fn and(mut self, condition: Condition) -> Self {
        self.filter.conditions.push(condition);
        self
    }

    pub fn order_by(mut self, order: Order) -> Self {
        self.order.push(order);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn count(&self, table: &str, filter: &Filter) -> Result<u64, StoreError>;

    async fn find(&self, table: &str, query: &Query) -> Result<Vec<Row>, StoreError>;

    /// First matching row; `StoreError::NotFound` when nothing matches.
    async fn first(&self, table: &str, filter: &Filter) -> Result<Row, StoreError>;

    /// Insert a row and return it as stored; `StoreError::UniqueViolation` on conflicts.
    async fn insert(&self, table: &str, row: &Row) -> Result<Row, StoreError>;

    /// Set `changes` on every row matching `filter`. Returns rows affected.
    async fn update(&self, table: &str, filter: &Filter, changes: &Row) -> Result<u64, StoreError>;

    /// Delete every row matching `filter`. Returns rows affected.
    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64, StoreError>;

    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// A transaction scope. Dropping it without `commit` rolls back.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Handle running every operation inside this transaction.
    fn store(&self) -> Db;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Typed access to the table of a [`Resource`].
pub struct Records<T> {
    db: Db,
    _record: PhantomData<fn() -> T>,
}

impl<T: Resource> Records<T> {
    pub fn new(db: Db) -> Self {
        Records {
            db,
            _record: PhantomData,
        }
    }

    pub async fn count(&self, filter: &Filter) -> Result<u64, StoreError> {
        self.db.count(T::TABLE, filter).await
    }

    pub async fn find(&self, query: &Query) -> Result<Vec<T>, StoreError> {
        let rows = self.db.find(T::TABLE, query).await?;
        rows.into_iter().map(decode).collect()
    }

    pub async fn first(&self, filter: &Filter) -> Result<T, StoreError> {
        decode(self.db.first(T::TABLE, filter).await?)
    }

    pub async fn insert(&self, record: &T) -> Result<T, StoreError> {
        let row = encode(record)?;
        decode(self.db.insert(T::TABLE, &row).await?)
    }

    pub async fn update(&self, filter: &Filter, changes: &Row) -> Result<u64, StoreError> {
        self.db.update(T::TABLE, filter, changes).await
    }

    pub async fn delete(&self, filter: &Filter) -> Result<u64, StoreError> {
        self.db.delete(T::TABLE, filter).await
    }
}

/// Serialize a record into a row. Records must serialize as JSON objects.
pub fn encode<T: Resource>(record: &T) -> Result<Row, StoreError> {
    match serde_json::to_value(record).map_err(StoreError::Encode)? {
        Value::Object(row) => Ok(row),
        other => Err(StoreError::Encode(serde::ser::Error::custom(format!(
            "record of {} serialized to {} instead of an object",
            T::TABLE,
            other
        )))),
    }
}

pub fn decode<T: Resource>(row: Row) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(row)).map_err(StoreError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_order_expressions() {
        assert_eq!("CreatedAt DESC".parse::<Order>().unwrap(), Order::desc("created_at"));
        assert_eq!("title".parse::<Order>().unwrap(), Order::asc("title"));
        assert_eq!("title Asc".parse::<Order>().unwrap(), Order::asc("title"));
        assert!("title sideways".parse::<Order>().is_err());
        assert!("".parse::<Order>().is_err());
        assert!("a desc b".parse::<Order>().is_err());
    }

    #[test]
    fn filter_builder_collects_conditions() {
        let f = Filter::new().eq("owner_id", "u1").contains(["email", "name"], "ann");
        assert_eq!(f.conditions.len(), 2);
        assert_eq!(f.conditions[0], Condition::Eq("owner_id".into(), Value::from("u1")));
    }
}
