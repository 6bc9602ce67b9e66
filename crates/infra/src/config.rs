//! Configuration loading and representation.
//!
//! Everything comes from environment variables, optionally seeded from a `.env` file.
//! Only the database location is required; every other setting has a default.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgSslMode};
use thiserror::Error;

use crate::cache::DEFAULT_CACHE_TTL;
use crate::health::DEFAULT_HEALTHCHECK_INTERVAL;
use crate::workers::cache_warmer::{DEFAULT_WARMUP_LIMIT, DEFAULT_WARMUP_TIMEOUT};

const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8081";
const DEFAULT_REDIS_HOST: &str = "localhost:6379";
const DEFAULT_DB_PORT: u16 = 5432;
const DEFAULT_DB_SSL_MODE: &str = "disable";
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },

    #[error("failed to load .env file: {0}")]
    DotEnv(String),
}

/// Where the durable store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseConfig {
    Url(String),
    Parts {
        host: String,
        port: u16,
        user: String,
        password: String,
        name: String,
        ssl_mode: String,
    },
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> Result<PgConnectOptions, ConfigError> {
        match self {
            Self::Url(url) => PgConnectOptions::from_str(url).map_err(|_| ConfigError::Invalid {
                key: "DATABASE_URL".to_string(),
                value: "<redacted>".to_string(),
            }),
            Self::Parts {
                host,
                port,
                user,
                password,
                name,
                ssl_mode,
            } => {
                let ssl_mode =
                    PgSslMode::from_str(ssl_mode).map_err(|_| ConfigError::Invalid {
                        key: "DB_SSL_MODE".to_string(),
                        value: ssl_mode.clone(),
                    })?;
                Ok(PgConnectOptions::new()
                    .host(host)
                    .port(*port)
                    .username(user)
                    .password(password)
                    .database(name)
                    .ssl_mode(ssl_mode))
            }
        }
    }
}

/// Redis Streams consumer group settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub redis_url: String,
    pub stream_key: String,
    pub group: String,
    pub consumer: String,
    /// How long a single XREADGROUP may block on the server.
    pub block_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    /// Cache Redis.
    pub redis_url: String,
    pub queue: QueueConfig,
    pub http_addr: SocketAddr,
    pub cache_ttl: Duration,
    pub warmup_limit: usize,
    pub warmup_timeout: Duration,
    pub healthcheck_interval: Duration,
    pub shutdown_timeout: Duration,
    pub producer_enabled: bool,
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                return Err(ConfigError::DotEnv(err.to_string()));
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let redis_url = match env.get("REDIS_URL") {
            Some(url) => url,
            None => {
                let host = env.get_or("REDIS_HOST", DEFAULT_REDIS_HOST);
                match env.get("REDIS_PASSWORD") {
                    Some(password) => format!("redis://:{password}@{host}"),
                    None => format!("redis://{host}"),
                }
            }
        };

        let queue = QueueConfig {
            redis_url: env.get("QUEUE_REDIS_URL").unwrap_or_else(|| redis_url.clone()),
            stream_key: env.get_or("QUEUE_STREAM", "orders"),
            group: env.get_or("QUEUE_GROUP", "orderflow"),
            consumer: env.get_or("QUEUE_CONSUMER", "orderflow-1"),
            block_ms: env.parse_or("QUEUE_BLOCK_MS", 1000)?,
        };

        Ok(Self {
            database: database_config(&env)?,
            redis_url,
            queue,
            http_addr: env.parse_or("HTTP_ADDR", DEFAULT_HTTP_ADDR.parse().map_err(|_| {
                ConfigError::Invalid {
                    key: "HTTP_ADDR".to_string(),
                    value: DEFAULT_HTTP_ADDR.to_string(),
                }
            })?)?,
            cache_ttl: env.positive_secs_or("CACHE_TTL_SECS", DEFAULT_CACHE_TTL)?,
            warmup_limit: env.parse_or("WARMUP_LIMIT", DEFAULT_WARMUP_LIMIT)?,
            warmup_timeout: env.secs_or("WARMUP_TIMEOUT_SECS", DEFAULT_WARMUP_TIMEOUT)?,
            healthcheck_interval: env
                .positive_secs_or("HEALTHCHECK_INTERVAL_SECS", DEFAULT_HEALTHCHECK_INTERVAL)?,
            shutdown_timeout: env.secs_or("SHUTDOWN_TIMEOUT_SECS", DEFAULT_SHUTDOWN_TIMEOUT)?,
            producer_enabled: env.parse_or("PRODUCER_ENABLED", false)?,
        })
    }
}

fn database_config<F>(env: &Env<F>) -> Result<DatabaseConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = env.get("DATABASE_URL") {
        return Ok(DatabaseConfig::Url(url));
    }

    Ok(DatabaseConfig::Parts {
        host: env.require("DB_HOST")?,
        port: env.parse_or("DB_PORT", DEFAULT_DB_PORT)?,
        user: env.require("DB_USER")?,
        password: env.get("DB_PASSWORD").unwrap_or_default(),
        name: env.require("DB_NAME")?,
        ssl_mode: env.get_or("DB_SSL_MODE", DEFAULT_DB_SSL_MODE),
    })
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn require(&self, key: &str) -> Result<String, ConfigError> {
        match (self.lookup)(key) {
            None => Err(ConfigError::MissingEnvVar(key.to_string())),
            Some(v) if v.trim().is_empty() => Err(ConfigError::EmptyValue(key.to_string())),
            Some(v) => Ok(v.trim().to_string()),
        }
    }

    fn parse_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: key.to_string(),
                value,
            }),
        }
    }

    fn secs_or(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        self.parse_or(key, default.as_secs()).map(Duration::from_secs)
    }

    /// Like [`Env::secs_or`], but zero is rejected.
    fn positive_secs_or(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        let secs = self.secs_or(key, default)?;
        if secs.is_zero() {
            return Err(ConfigError::Invalid {
                key: key.to_string(),
                value: "0".to_string(),
            });
        }
        Ok(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_with_database_url() {
        let config = load(&[("DATABASE_URL", "postgres://u:p@db:5432/orders")]).unwrap();

        assert_eq!(
            config.database,
            DatabaseConfig::Url("postgres://u:p@db:5432/orders".to_string())
        );
        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert_eq!(config.queue.redis_url, config.redis_url);
        assert_eq!(config.queue.stream_key, "orders");
        assert_eq!(config.queue.group, "orderflow");
        assert_eq!(config.queue.consumer, "orderflow-1");
        assert_eq!(config.queue.block_ms, 1000);
        assert_eq!(config.http_addr, "0.0.0.0:8081".parse().unwrap());
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.warmup_limit, 5);
        assert_eq!(config.warmup_timeout, Duration::from_secs(30));
        assert_eq!(config.healthcheck_interval, Duration::from_secs(10));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(10));
        assert!(!config.producer_enabled);
    }

    #[test]
    fn database_from_parts() {
        let config = load(&[
            ("DB_HOST", "db"),
            ("DB_USER", "orders"),
            ("DB_PASSWORD", "secret"),
            ("DB_NAME", "orders"),
        ])
        .unwrap();

        assert_eq!(
            config.database,
            DatabaseConfig::Parts {
                host: "db".to_string(),
                port: 5432,
                user: "orders".to_string(),
                password: "secret".to_string(),
                name: "orders".to_string(),
                ssl_mode: "disable".to_string(),
            }
        );
        assert!(config.database.connect_options().is_ok());
    }

    #[test]
    fn missing_database_is_an_error() {
        assert!(matches!(
            load(&[]),
            Err(ConfigError::MissingEnvVar(key)) if key == "DB_HOST"
        ));
        assert!(matches!(
            load(&[("DB_HOST", "db"), ("DB_USER", " "), ("DB_NAME", "orders")]),
            Err(ConfigError::EmptyValue(key)) if key == "DB_USER"
        ));
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = load(&[("DATABASE_URL", "postgres://db/orders"), ("CACHE_TTL_SECS", "five")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key, .. } if key == "CACHE_TTL_SECS"));
    }

    #[test]
    fn zero_intervals_are_rejected() {
        for key in ["HEALTHCHECK_INTERVAL_SECS", "CACHE_TTL_SECS"] {
            let err = load(&[("DATABASE_URL", "postgres://db/orders"), (key, "0")]).unwrap_err();
            assert!(
                matches!(&err, ConfigError::Invalid { key: k, value } if k == key && value == "0"),
                "{key}: {err}"
            );
        }
    }

    #[test]
    fn invalid_ssl_mode_is_rejected() {
        let config = load(&[
            ("DB_HOST", "db"),
            ("DB_USER", "orders"),
            ("DB_NAME", "orders"),
            ("DB_SSL_MODE", "sometimes"),
        ])
        .unwrap();
        assert!(config.database.connect_options().is_err());
    }

    #[test]
    fn redis_url_from_host_and_password() {
        let config = load(&[
            ("DATABASE_URL", "postgres://db/orders"),
            ("REDIS_HOST", "cache:6380"),
            ("REDIS_PASSWORD", "pw"),
            ("QUEUE_REDIS_URL", "redis://queue:6379"),
            ("PRODUCER_ENABLED", "true"),
        ])
        .unwrap();

        assert_eq!(config.redis_url, "redis://:pw@cache:6380");
        assert_eq!(config.queue.redis_url, "redis://queue:6379");
        assert!(config.producer_enabled);
    }
}
