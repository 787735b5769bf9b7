//! Redis settings for refresh event fan-out

use crate::{env_or, non_blank_env, ConfigResult};

const DEV_REDIS_URL: &str = "redis://localhost:6379";
const DEFAULT_EVENTS_CHANNEL: &str = "encore:refresh";

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub password: Option<String>,
    /// Pub/sub channel refresh events travel on
    pub events_channel: String,
}

impl RedisConfig {
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            url: env_or("REDIS_URL", DEV_REDIS_URL),
            password: non_blank_env("REDIS_PASSWORD"),
            events_channel: env_or("REDIS_EVENTS_CHANNEL", DEFAULT_EVENTS_CHANNEL),
        })
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            password: None,
            events_channel: DEFAULT_EVENTS_CHANNEL.to_string(),
        }
    }

    /// `url` with the password spliced in as the userinfo
    pub fn connection_url(&self) -> String {
        let Some(password) = &self.password else {
            return self.url.clone();
        };
        match self.url.split_once("://") {
            Some((scheme, rest)) => format!("{}://:{}@{}", scheme, password, rest),
            None => self.url.clone(),
        }
    }
}
