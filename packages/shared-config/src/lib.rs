//! Environment-driven configuration for Encore processes
//!
//! Every setting has a development default except the similarity service,
//! which is absent unless `RECOMMENDER_URL` is set.

mod database;
mod error;
mod recommender;
mod redis;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ConfigResult};
pub use recommender::{RecommenderConfig, MAX_TOP_K};
pub use redis::RedisConfig;

use std::env;
use std::fmt;
use std::str::FromStr;

/// Deployment mode, read from `ENVIRONMENT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        env::var("ENVIRONMENT")
            .map(|raw| raw.parse().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn is_production(&self) -> bool {
        *self == Self::Production
    }
}

impl FromStr for Environment {
    type Err = std::convert::Infallible;

    /// Unrecognized names fall back to development
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mode = match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "staging" | "stage" => Self::Staging,
            _ => Self::Development,
        };
        Ok(mode)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        })
    }
}

/// Settings every Encore process reads
#[derive(Debug, Clone)]
pub struct CommonConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    /// Refresh event fan-out
    pub redis: RedisConfig,
    /// `None` disables queue continuation
    pub recommender: Option<RecommenderConfig>,
}

impl CommonConfig {
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            environment: Environment::from_env(),
            database: DatabaseConfig::from_env()?,
            redis: RedisConfig::from_env()?,
            recommender: RecommenderConfig::from_env()?,
        })
    }
}

/// Value of `name`, or `default` when unset
pub fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Trimmed value of `name`; unset and blank are both `None`
pub fn non_blank_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Parse `name` as `T`, or `default` when unset
///
/// # Errors
/// Returns `ConfigError::InvalidValue` naming the variable when it is set
/// but does not parse.
pub fn parse_env<T>(name: &str, default: T) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let Ok(raw) = env::var(name) else {
        return Ok(default);
    };
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}
