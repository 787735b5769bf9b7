//! API server settings
//!
//! Layered over [`CommonConfig`]: the HTTP port, CORS origins and the
//! now-playing lifetime only matter to the API process.

use std::env;

use anyhow::{bail, Context, Result};
use encore_shared_config::{
    non_blank_env, parse_env, CommonConfig, DatabaseConfig, Environment, RecommenderConfig,
    RedisConfig,
};

const DEFAULT_PORT: u16 = 8080;

/// Seconds a now-playing report stays visible
const DEFAULT_NOW_PLAYING_TTL_SECS: u64 = 600;

#[derive(Debug, Clone)]
pub struct Config {
    pub common: CommonConfig,
    pub port: u16,
    /// Origins allowed by CORS; `None` means the mode default
    pub cors_allowed_origins: Option<Vec<String>>,
    pub now_playing_ttl_secs: u64,
}

impl Config {
    /// Read settings from the process environment
    ///
    /// # Errors
    /// Fails on unparseable values, a zero now-playing lifetime, and in
    /// production when `DATABASE_URL` is not set explicitly.
    pub fn from_env() -> Result<Self> {
        let common = CommonConfig::from_env().context("failed to load common settings")?;
        if common.environment.is_production() {
            require_database_url()?;
        }

        let port = parse_env("PORT", DEFAULT_PORT).context("invalid PORT")?;
        let now_playing_ttl_secs =
            parse_env("NOW_PLAYING_TTL_SECS", DEFAULT_NOW_PLAYING_TTL_SECS)
                .context("invalid NOW_PLAYING_TTL_SECS")?;
        if now_playing_ttl_secs == 0 {
            bail!("NOW_PLAYING_TTL_SECS must be greater than zero");
        }

        Ok(Self {
            common,
            port,
            cors_allowed_origins: non_blank_env("CORS_ORIGINS").map(|raw| split_origins(&raw)),
            now_playing_ttl_secs,
        })
    }

    pub fn database(&self) -> &DatabaseConfig {
        &self.common.database
    }

    pub fn redis(&self) -> &RedisConfig {
        &self.common.redis
    }

    /// Similarity service settings, `None` when continuation is disabled
    pub fn recommender(&self) -> Option<&RecommenderConfig> {
        self.common.recommender.as_ref()
    }

    pub fn environment(&self) -> Environment {
        self.common.environment
    }

    pub fn is_production(&self) -> bool {
        self.common.environment.is_production()
    }
}

/// Production must never fall back to the development database
fn require_database_url() -> Result<()> {
    if non_blank_env("DATABASE_URL").is_none() {
        bail!("DATABASE_URL must be set when ENVIRONMENT is production");
    }
    Ok(())
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect()
}
