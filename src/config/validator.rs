//! Config validation: values that parse but cannot work.

use crate::config::AppConfig;
use crate::error::ConfigError;

pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    if config.jwt.secret.trim().is_empty() {
        return Err(ConfigError::Validation("jwt secret must not be empty".into()));
    }
    if config.jwt.ttl_min <= 0 {
        return Err(ConfigError::Validation("jwt ttl must be positive".into()));
    }
    if config.http.port == 0 || config.http.admin_port == 0 {
        return Err(ConfigError::Validation("ports must be non-zero".into()));
    }
    if config.http.port == config.http.admin_port {
        return Err(ConfigError::Validation(format!(
            "api and admin listeners share port {}",
            config.http.port
        )));
    }
    if config.db.max_connections == 0 {
        return Err(ConfigError::Validation("db max connections must be positive".into()));
    }
    let limits = &config.limits;
    if limits.request_timeout_sec == 0 || limits.max_body_bytes == 0 || limits.concurrency_limit == 0 {
        return Err(ConfigError::Validation("request limits must be positive".into()));
    }
    if limits.rate_limit_rps == 0 || limits.rate_limit_burst == 0 {
        return Err(ConfigError::Validation("rate limit must be positive".into()));
    }
    Ok(())
}
