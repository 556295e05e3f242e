//! Load settings from `APP_*` environment variables (after `.env`), or from any lookup
//! function so tests never touch the process environment.

use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use std::str::FromStr;

pub const ENV_PREFIX: &str = "APP_";

/// Read `.env` if present, then load and validate from the process environment.
pub fn from_env() -> Result<AppConfig, ConfigError> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::warn!(error = %e, "could not read .env");
        }
    }
    from_lookup(|key| std::env::var(key).ok())
}

/// Build a config from `lookup(full_key)`; keys are `APP_`-prefixed except the
/// `DATABASE_URL` fallback.
pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<AppConfig, ConfigError> {
    let get = |key: &'static str| -> Option<String> {
        lookup(&format!("{}{}", ENV_PREFIX, key))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let config = AppConfig {
        http: HttpConfig {
            host: get("HTTP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&get, "HTTP_PORT", 8080)?,
            admin_port: parse_or(&get, "ADMIN_PORT", 8081)?,
        },
        db: DbConfig {
            dsn: get("DB_DSN").or_else(|| lookup("DATABASE_URL").filter(|v| !v.trim().is_empty())),
            max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", 10)?,
        },
        jwt: JwtConfig {
            secret: get("JWT_SECRET").ok_or(ConfigError::Missing("APP_JWT_SECRET"))?,
            issuer: get("JWT_ISSUER").unwrap_or_else(|| "ezkit".into()),
            ttl_min: parse_or(&get, "JWT_TTL_MIN", 120)?,
        },
        limits: LimitsConfig {
            request_timeout_sec: parse_or(&get, "REQUEST_TIMEOUT_SEC", 10)?,
            max_body_bytes: parse_or(&get, "MAX_BODY_BYTES", 16 << 20)?,
            concurrency_limit: parse_or(&get, "CONCURRENCY_LIMIT", 300)?,
            rate_limit_rps: parse_or(&get, "RATE_LIMIT_RPS", 200)?,
            rate_limit_burst: parse_or(&get, "RATE_LIMIT_BURST", 400)?,
        },
        log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".into()),
    };
    validate(&config)?;
    Ok(config)
}

fn parse_or<T: FromStr>(
    get: &impl Fn(&'static str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let c = from_lookup(lookup(&[("APP_JWT_SECRET", "s")])).unwrap();
        assert_eq!(c.http.port, 8080);
        assert_eq!(c.http.admin_port, 8081);
        assert_eq!(c.http.host, "0.0.0.0");
        assert_eq!(c.db.dsn, None);
        assert_eq!(c.db.max_connections, 10);
        assert_eq!(c.jwt.issuer, "ezkit");
        assert_eq!(c.jwt.ttl_min, 120);
        assert_eq!(c.limits, LimitsConfig::default());
        assert_eq!(c.log_level, "info");
    }

    #[test]
    fn missing_secret_is_an_error() {
        let err = from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("APP_JWT_SECRET")));
    }

    #[test]
    fn database_url_is_a_fallback() {
        let c = from_lookup(lookup(&[("APP_JWT_SECRET", "s"), ("DATABASE_URL", "postgres://x")])).unwrap();
        assert_eq!(c.db.dsn.as_deref(), Some("postgres://x"));
        let c = from_lookup(lookup(&[
            ("APP_JWT_SECRET", "s"),
            ("DATABASE_URL", "postgres://x"),
            ("APP_DB_DSN", "postgres://y"),
        ]))
        .unwrap();
        assert_eq!(c.db.dsn.as_deref(), Some("postgres://y"));
    }

    #[test]
    fn rate_limit_is_configurable() {
        let c = from_lookup(lookup(&[
            ("APP_JWT_SECRET", "s"),
            ("APP_RATE_LIMIT_RPS", "5"),
            ("APP_RATE_LIMIT_BURST", "10"),
        ]))
        .unwrap();
        assert_eq!(c.limits.rate_limit_rps, 5);
        assert_eq!(c.limits.rate_limit_burst, 10);
    }

    #[test]
    fn unparsable_number_names_the_key() {
        let err = from_lookup(lookup(&[("APP_JWT_SECRET", "s"), ("APP_HTTP_PORT", "eighty")])).unwrap_err();
        match err {
            ConfigError::Invalid { key, value } => {
                assert_eq!(key, "HTTP_PORT");
                assert_eq!(value, "eighty");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
