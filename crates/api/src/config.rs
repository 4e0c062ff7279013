//! Application configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use std::env;
use std::time::Duration;

use lotkeeper_infra::EngineConfig;

/// API process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Socket address to listen on.
    pub bind_addr: String,

    /// Use the Postgres lot store instead of the in-memory one.
    pub use_persistent_stores: bool,

    /// PostgreSQL connection string (required when persistent).
    pub database_url: Option<String>,

    /// Upper bound on waiting for product locks.
    pub lock_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            use_persistent_stores: false,
            database_url: None,
            lock_timeout: EngineConfig::default().lock_timeout,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let use_persistent_stores = match lookup("USE_PERSISTENT_STORES") {
            None => defaults.use_persistent_stores,
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::InvalidValue("USE_PERSISTENT_STORES".to_string()))?,
        };

        let lock_timeout = match lookup("LOCK_TIMEOUT_MS") {
            None => defaults.lock_timeout,
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::InvalidValue("LOCK_TIMEOUT_MS".to_string()))?,
        };

        let config = AppConfig {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            use_persistent_stores,
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            lock_timeout,
        };

        if config.use_persistent_stores && config.database_url.is_none() {
            return Err(ConfigError::MissingRequired("DATABASE_URL".to_string()));
        }

        Ok(config)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default().with_lock_timeout(self.lock_timeout)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
