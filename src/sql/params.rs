//! Convert serde_json::Value to a text parameter sqlx can bind.
//!
//! Every value travels as text; the statement casts it to the column's catalog type
//! (`$1::"int4"`), so one bind type covers every column.

use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;

#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Null,
    Text(String),
}

impl PgBindValue {
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => PgBindValue::Null,
            Value::Bool(b) => PgBindValue::Text(b.to_string()),
            Value::Number(n) => PgBindValue::Text(n.to_string()),
            Value::String(s) => PgBindValue::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => PgBindValue::Text(v.to_string()),
        }
    }
}

/// Render a JSON array as a PostgreSQL array literal: `["a b", 1, null]` ->
/// `{"a b",1,NULL}`. Nested arrays nest; objects go in as quoted JSON text.
pub fn pg_array_literal(items: &[Value]) -> String {
    let elements: Vec<String> = items
        .iter()
        .map(|v| match v {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => quote_element(s),
            Value::Array(inner) => pg_array_literal(inner),
            Value::Object(_) => quote_element(&v.to_string()),
        })
        .collect();
    format!("{{{}}}", elements.join(","))
}

fn quote_element(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            PgBindValue::Null => IsNull::Yes,
            PgBindValue::Text(s) => <&str as Encode<Postgres>>::encode_by_ref(&s.as_str(), buf)?,
        })
    }
}

impl sqlx::Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_json_as_text() {
        assert_eq!(PgBindValue::from_json(&json!(null)), PgBindValue::Null);
        assert_eq!(PgBindValue::from_json(&json!(true)), PgBindValue::Text("true".into()));
        assert_eq!(PgBindValue::from_json(&json!(42)), PgBindValue::Text("42".into()));
        assert_eq!(PgBindValue::from_json(&json!("x")), PgBindValue::Text("x".into()));
        assert_eq!(
            PgBindValue::from_json(&json!({"a": [1]})),
            PgBindValue::Text(r#"{"a":[1]}"#.into())
        );
    }

    #[test]
    fn array_literals_quote_strings_and_nest() {
        assert_eq!(pg_array_literal(&[json!(1), json!(2)]), "{1,2}");
        assert_eq!(pg_array_literal(&[]), "{}");
        assert_eq!(
            pg_array_literal(&[json!("a b"), json!(null), json!(r#"say "hi"\"#)]),
            r#"{"a b",NULL,"say \"hi\"\\"}"#
        );
        assert_eq!(pg_array_literal(&[json!([1, 2]), json!([3, 4])]), "{{1,2},{3,4}}");
    }
}
