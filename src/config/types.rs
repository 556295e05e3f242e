//! Runtime settings, grouped by concern.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Listener for admin modules.
    pub admin_port: u16,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConfig {
    /// PostgreSQL connection string. Unset means the in-memory store.
    pub dsn: Option<String>,
    pub max_connections: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtConfig {
    #[serde(skip_serializing)]
    pub secret: String,
    pub issuer: String,
    pub ttl_min: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub request_timeout_sec: u64,
    pub max_body_bytes: usize,
    pub concurrency_limit: usize,
    /// Token bucket refill rate, requests per second.
    pub rate_limit_rps: u32,
    pub rate_limit_burst: u32,
}

impl LimitsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_sec)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        LimitsConfig {
            request_timeout_sec: 10,
            max_body_bytes: 16 << 20,
            concurrency_limit: 300,
            rate_limit_rps: 200,
            rate_limit_burst: 400,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub db: DbConfig,
    pub jwt: JwtConfig,
    pub limits: LimitsConfig,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
}
