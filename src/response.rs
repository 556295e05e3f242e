//! Standard response envelope: every endpoint answers `{"code", "msg", "data"}`
//! with transport status 200. Clients branch on `code`, never on the HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

pub const CODE_OK: i32 = 0;
pub const CODE_BAD_REQUEST: i32 = 400;
pub const CODE_UNAUTHORIZED: i32 = 401;
pub const CODE_FORBIDDEN: i32 = 403;
pub const CODE_NOT_FOUND: i32 = 404;
pub const CODE_SERVER_ERROR: i32 = 500;
pub const CODE_TIMEOUT: i32 = 504;

/// Default message for a code, used when the caller supplies none.
pub fn default_message(code: i32) -> &'static str {
    match code {
        CODE_OK => "OK",
        CODE_BAD_REQUEST => "Bad Request",
        CODE_UNAUTHORIZED => "Unauthorized",
        CODE_FORBIDDEN => "Forbidden",
        CODE_NOT_FOUND => "Not Found",
        CODE_SERVER_ERROR => "Internal Server Error",
        CODE_TIMEOUT => "Gateway Timeout",
        _ => "",
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Envelope {
    pub code: i32,
    pub msg: String,
    pub data: Value,
}

impl Envelope {
    /// Build an envelope; a `null` payload is replaced by `{}`.
    pub fn new(code: i32, msg: impl Into<String>, data: Value) -> Self {
        let data = match data {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        Envelope {
            code,
            msg: msg.into(),
            data,
        }
    }
}

/// Success envelope. A payload that fails to serialize turns into a 500 envelope.
pub fn ok<T: Serialize>(data: T) -> Envelope {
    match serde_json::to_value(data) {
        Ok(v) => Envelope::new(CODE_OK, default_message(CODE_OK), v),
        Err(e) => {
            tracing::error!(error = %e, "response payload serialization failed");
            error(CODE_SERVER_ERROR, e.to_string())
        }
    }
}

/// Error envelope. An empty message falls back to the code's default message.
pub fn error(code: i32, message: impl Into<String>) -> Envelope {
    let message = message.into();
    let msg = if message.is_empty() {
        default_message(code).to_string()
    } else {
        message
    };
    Envelope::new(code, msg, Value::Null)
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Render a handler outcome: success envelope or the error's envelope.
pub fn respond<T: Serialize>(result: Result<T, crate::error::ApiError>) -> Response {
    match result {
        Ok(data) => ok(data).into_response(),
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_keeps_payload() {
        let env = ok(json!({"id": "a1"}));
        assert_eq!(env.code, CODE_OK);
        assert_eq!(env.msg, "OK");
        assert_eq!(env.data, json!({"id": "a1"}));
    }

    #[test]
    fn null_payload_becomes_empty_object() {
        let env = ok(());
        assert_eq!(env.data, json!({}));
        let env = ok(Option::<String>::None);
        assert_eq!(env.data, json!({}));
    }

    #[test]
    fn every_error_kind_serializes_non_null_data() {
        for code in [
            CODE_BAD_REQUEST,
            CODE_UNAUTHORIZED,
            CODE_FORBIDDEN,
            CODE_NOT_FOUND,
            CODE_SERVER_ERROR,
        ] {
            let body = serde_json::to_value(error(code, "")).unwrap();
            assert_eq!(body["code"], json!(code));
            assert_eq!(body["msg"], json!(default_message(code)));
            assert_eq!(body["data"], json!({}));
        }
    }

    #[test]
    fn custom_message_overrides_default() {
        let env = error(CODE_NOT_FOUND, "user not found");
        assert_eq!(env.msg, "user not found");
    }

    #[test]
    fn transport_status_is_always_ok() {
        let resp = error(CODE_SERVER_ERROR, "boom").into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
