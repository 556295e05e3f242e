//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE from a table description.

use super::params::pg_array_literal;
use crate::error::StoreError;
use crate::store::{Condition, Filter, Query, Row};
use serde_json::Value;

/// One column as described by `information_schema.columns`.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    /// Cast target for parameters, already quoted (`"int4"`, `"public"."mood"`).
    pub pg_type: String,
    /// `ARRAY` column; parameters go out as array literals, values come back as JSON.
    pub array: bool,
}

impl ColumnInfo {
    /// Build from catalog fields: `data_type`, `udt_schema`, `udt_name`.
    pub fn from_catalog(name: &str, data_type: &str, udt_schema: &str, udt_name: &str) -> Self {
        let pg_type = if data_type == "USER-DEFINED" {
            format!("{}.{}", quoted(udt_schema), quoted(udt_name))
        } else {
            quoted(udt_name)
        };
        ColumnInfo {
            name: name.to_string(),
            pg_type,
            array: data_type == "ARRAY",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableInfo {
    pub schema: String,
    pub table: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableInfo {
    fn column(&self, name: &str) -> Result<&ColumnInfo, StoreError> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| StoreError::UnknownColumn {
                table: self.table.clone(),
                column: name.to_string(),
            })
    }

    fn qualified(&self) -> String {
        format!("{}.{}", quoted(&self.schema), quoted(&self.table))
    }
}

/// Catalog lookup used to build [`TableInfo`]. Params: schema, table.
pub const COLUMNS_SQL: &str = "SELECT column_name::text, data_type::text, udt_schema::text, udt_name::text \
     FROM information_schema.columns WHERE table_schema = $1 AND table_name = $2 ORDER BY ordinal_position";

/// Quote identifier for PostgreSQL.
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Push a value and return its placeholder cast to the column type.
    fn push_param(&mut self, v: Value, column: &ColumnInfo) -> String {
        let v = match v {
            Value::Array(items) if column.array => Value::String(pg_array_literal(&items)),
            v => v,
        };
        self.params.push(v);
        format!("${}::{}", self.params.len(), column.pg_type)
    }

    fn push_text(&mut self, v: String) -> String {
        self.params.push(Value::String(v));
        format!("${}", self.params.len())
    }
}

/// SELECT list: user-defined types as text, numeric as float8, arrays as JSON, so rows
/// decode to plain JSON.
fn select_column_list(table: &TableInfo) -> String {
    table
        .columns
        .iter()
        .map(|c| {
            let q = quoted(&c.name);
            if c.array {
                format!("to_json({}) AS {}", q, q)
            } else if c.pg_type.contains('.') {
                format!("{}::text AS {}", q, q)
            } else if c.pg_type == "\"numeric\"" {
                format!("{}::float8 AS {}", q, q)
            } else {
                q
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn where_clause(table: &TableInfo, filter: &Filter, q: &mut QueryBuf) -> Result<String, StoreError> {
    let mut parts = Vec::with_capacity(filter.conditions.len());
    for cond in &filter.conditions {
        match cond {
            Condition::Eq(col, Value::Null) => {
                let c = table.column(col)?;
                parts.push(format!("{} IS NULL", quoted(&c.name)));
            }
            Condition::Eq(col, val) => {
                let c = table.column(col)?;
                let ph = q.push_param(val.clone(), c);
                parts.push(format!("{} = {}", quoted(&c.name), ph));
            }
            Condition::Contains { columns, needle } => {
                if columns.is_empty() {
                    parts.push("FALSE".to_string());
                    continue;
                }
                let ph = q.push_text(like_pattern(needle));
                let mut any = Vec::with_capacity(columns.len());
                for col in columns {
                    let c = table.column(col)?;
                    any.push(format!("{}::text ILIKE {}", quoted(&c.name), ph));
                }
                parts.push(format!("({})", any.join(" OR ")));
            }
        }
    }
    Ok(if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    })
}

/// SELECT with filter, ORDER BY, LIMIT/OFFSET.
pub fn select(table: &TableInfo, query: &Query) -> Result<QueryBuf, StoreError> {
    let mut q = QueryBuf::new();
    let where_clause = where_clause(table, &query.filter, &mut q)?;
    let mut order = Vec::with_capacity(query.order.len());
    for o in &query.order {
        let c = table.column(&o.column)?;
        order.push(format!("{} {}", quoted(&c.name), if o.desc { "DESC" } else { "ASC" }));
    }
    let order_clause = if order.is_empty() {
        String::new()
    } else {
        format!(" ORDER BY {}", order.join(", "))
    };
    let limit_clause = query.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset_clause = query.offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}{}",
        select_column_list(table),
        table.qualified(),
        where_clause,
        order_clause,
        limit_clause,
        offset_clause
    );
    Ok(q)
}

pub fn count(table: &TableInfo, filter: &Filter) -> Result<QueryBuf, StoreError> {
    let mut q = QueryBuf::new();
    let where_clause = where_clause(table, filter, &mut q)?;
    q.sql = format!("SELECT COUNT(*) FROM {}{}", table.qualified(), where_clause);
    Ok(q)
}

/// INSERT the row's keys that are table columns; other keys are ignored.
pub fn insert(table: &TableInfo, row: &Row) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &table.columns {
        let Some(val) = row.get(&c.name) else { continue };
        placeholders.push(q.push_param(val.clone(), c));
        cols.push(quoted(&c.name));
    }
    let returning = select_column_list(table);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table.qualified(), returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table.qualified(),
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE ... SET changed columns WHERE filter. `None` when no change names a column.
pub fn update(table: &TableInfo, filter: &Filter, changes: &Row) -> Result<Option<QueryBuf>, StoreError> {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for c in &table.columns {
        let Some(val) = changes.get(&c.name) else { continue };
        let rhs = q.push_param(val.clone(), c);
        sets.push(format!("{} = {}", quoted(&c.name), rhs));
    }
    if sets.is_empty() {
        return Ok(None);
    }
    let where_clause = where_clause(table, filter, &mut q)?;
    q.sql = format!("UPDATE {} SET {}{}", table.qualified(), sets.join(", "), where_clause);
    Ok(Some(q))
}

pub fn delete(table: &TableInfo, filter: &Filter) -> Result<QueryBuf, StoreError> {
    let mut q = QueryBuf::new();
    let where_clause = where_clause(table, filter, &mut q)?;
    q.sql = format!("DELETE FROM {}{}", table.qualified(), where_clause);
    Ok(q)
}
