use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Timeout for a single feed fetch.
    pub fetch_timeout: Duration,
    /// Timeout for AI generation and publish calls.
    pub http_timeout: Duration,

    /// Base delay for the publish retry backoff (1s, 4s, 16s at the default).
    pub publish_retry_base: Duration,
    /// Maximum publish attempts before a post settles in `error`.
    pub publish_retry_attempts: u32,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_path: PathBuf::from(env_or_default(
                "DATABASE_PATH",
                "./data/publisher.sqlite",
            )),
            fetch_timeout: Duration::from_secs(parse_env_u64("FETCH_TIMEOUT_SECS", 30)?),
            http_timeout: Duration::from_secs(parse_env_u64("HTTP_TIMEOUT_SECS", 120)?),
            publish_retry_base: Duration::from_millis(parse_env_u64(
                "PUBLISH_RETRY_BASE_MS",
                1000,
            )?),
            publish_retry_attempts: parse_env_u32("PUBLISH_RETRY_ATTEMPTS", 3)?,
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "FETCH_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.http_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "HTTP_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.publish_retry_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                name: "PUBLISH_RETRY_ATTEMPTS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Configuration with short timeouts and no retry delay, for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            database_path: PathBuf::from(":memory:"),
            fetch_timeout: Duration::from_secs(10),
            http_timeout: Duration::from_secs(10),
            publish_retry_base: Duration::from_millis(1),
            publish_retry_attempts: 3,
        }
    }
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_defaults() {
        assert_eq!(parse_env_u64("NONEXISTENT_VAR", 42).unwrap(), 42);
        assert_eq!(parse_env_u32("NONEXISTENT_VAR", 3).unwrap(), 3);
        assert_eq!(env_or_default("NONEXISTENT_VAR", "fallback"), "fallback");
    }

    #[test]
    fn test_validate_rejects_zero_retries() {
        let config = Config {
            publish_retry_attempts: 0,
            ..Config::for_testing()
        };
        assert!(config.validate().is_err());
    }
}
