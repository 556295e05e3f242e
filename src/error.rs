//! Typed errors and envelope mapping.

use crate::response::{
    self, CODE_BAD_REQUEST, CODE_FORBIDDEN, CODE_NOT_FOUND, CODE_SERVER_ERROR, CODE_UNAUTHORIZED,
};
use axum::response::{IntoResponse, Response};
use std::fmt;
use thiserror::Error;

/// Error type accepted from handlers and hooks. Anything convertible with `?` fits.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing setting: {0}")]
    Missing(&'static str),
    #[error("invalid setting {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("transaction already finished")]
    Closed,
    #[error("nested transactions are not supported")]
    NestedTransaction,
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("unknown column {column} on {table}")]
    UnknownColumn { table: String, column: String },
    #[error("decode: {0}")]
    Decode(serde_json::Error),
    #[error("encode: {0}")]
    Encode(serde_json::Error),
    #[error("database: {0}")]
    Db(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StoreError::UniqueViolation(db.message().to_string())
            }
            other => StoreError::Db(other),
        }
    }
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation(_))
    }
}

/// Structured error carried to the envelope: status-like code, message, optional cause.
#[derive(Debug)]
pub struct ApiError {
    pub code: i32,
    pub message: String,
    pub cause: Option<BoxError>,
}

impl ApiError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl Into<BoxError>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(CODE_BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(CODE_UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(CODE_FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(CODE_NOT_FOUND, message)
    }

    /// Internal failure; the cause is kept for logging, the message goes to the client.
    pub fn internal(message: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self::new(CODE_SERVER_ERROR, message).with_cause(cause)
    }

    /// Map any handler error: typed errors keep their code and message, the rest become 500.
    pub fn from_boxed(err: BoxError) -> Self {
        match err.downcast::<ApiError>() {
            Ok(api) => *api,
            Err(other) => ApiError::new(CODE_SERVER_ERROR, other.to_string()).with_cause(other),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.message.is_empty() {
            return f.write_str(&self.message);
        }
        match &self.cause {
            Some(cause) => write!(f, "{}", cause),
            None => f.write_str("action error"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|c| c as &(dyn std::error::Error + 'static))
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ApiError::not_found("not found"),
            other => ApiError::new(CODE_SERVER_ERROR, other.to_string()).with_cause(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.code >= CODE_SERVER_ERROR {
            match &self.cause {
                Some(cause) => tracing::error!(code = self.code, error = %cause, "{}", self),
                None => tracing::error!(code = self.code, "{}", self),
            }
        }
        response::error(self.code, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefers_message_then_cause() {
        assert_eq!(ApiError::bad_request("missing id").to_string(), "missing id");
        let e = ApiError::new(CODE_SERVER_ERROR, "").with_cause(StoreError::Closed);
        assert_eq!(e.to_string(), "transaction already finished");
        assert_eq!(ApiError::new(CODE_SERVER_ERROR, "").to_string(), "action error");
    }

    #[test]
    fn boxed_typed_error_keeps_code() {
        let boxed: BoxError = Box::new(ApiError::forbidden("admins only"));
        let api = ApiError::from_boxed(boxed);
        assert_eq!(api.code, CODE_FORBIDDEN);
        assert_eq!(api.message, "admins only");
    }

    #[test]
    fn boxed_foreign_error_becomes_internal() {
        let boxed: BoxError = "disk on fire".into();
        let api = ApiError::from_boxed(boxed);
        assert_eq!(api.code, CODE_SERVER_ERROR);
        assert_eq!(api.message, "disk on fire");
    }

    #[test]
    fn store_not_found_maps_to_404() {
        let api: ApiError = StoreError::NotFound.into();
        assert_eq!(api.code, CODE_NOT_FOUND);
    }
}
