//! Similarity service configuration

use crate::{non_blank_env, parse_env, ConfigError, ConfigResult};

/// Default request timeout for the similarity service, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of similar tracks requested per continuation
pub const DEFAULT_TOP_K: u32 = 20;

/// Largest `top_k` the similarity service is asked for
pub const MAX_TOP_K: u32 = 500;

/// Similarity (recommendation) service configuration
///
/// Loaded once at startup; the base address is never changed at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommenderConfig {
    /// Base URL of the similarity service (e.g. http://recommender:8001)
    pub url: String,

    /// Client-side request timeout in seconds
    pub timeout_secs: u64,

    /// Number of candidates requested per lookup
    pub top_k: u32,

    /// Library root as indexed by the similarity service, when it differs
    /// from this server's library root
    pub remote_library_root: Option<String>,
}

impl RecommenderConfig {
    /// Load the recommender configuration from environment variables
    ///
    /// Returns `Ok(None)` when `RECOMMENDER_URL` is unset or blank.
    pub fn from_env() -> ConfigResult<Option<Self>> {
        let Some(url) = non_blank_env("RECOMMENDER_URL") else {
            return Ok(None);
        };

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(
                "RECOMMENDER_URL".to_string(),
                url,
            ));
        }

        let timeout_secs = parse_env("RECOMMENDER_TIMEOUT", DEFAULT_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::OutOfRange(
                "RECOMMENDER_TIMEOUT must be greater than zero".to_string(),
            ));
        }

        let top_k = parse_env("RECOMMENDER_TOP_K", DEFAULT_TOP_K)?;
        if !(1..=MAX_TOP_K).contains(&top_k) {
            return Err(ConfigError::OutOfRange(format!(
                "RECOMMENDER_TOP_K must be between 1 and {} (got {})",
                MAX_TOP_K, top_k
            )));
        }

        Ok(Some(Self {
            url,
            timeout_secs,
            top_k,
            remote_library_root: non_blank_env("RECOMMENDER_LIBRARY_ROOT"),
        }))
    }

    /// Create a configuration with a custom URL (useful for testing)
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            top_k: DEFAULT_TOP_K,
            remote_library_root: None,
        }
    }

    /// Get the full URL for the similar-tracks endpoint
    pub fn similar_url(&self) -> String {
        format!("{}/v1/music/similar", self.url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Tests below mutate RECOMMENDER_* variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn load_with_top_k(top_k: &str) -> ConfigResult<Option<RecommenderConfig>> {
        std::env::set_var("RECOMMENDER_URL", "http://similarity:8001");
        std::env::set_var("RECOMMENDER_TOP_K", top_k);
        let result = RecommenderConfig::from_env();
        std::env::remove_var("RECOMMENDER_TOP_K");
        std::env::remove_var("RECOMMENDER_URL");
        result
    }

    #[test]
    fn test_top_k_out_of_range_rejected_at_load() {
        let _lock = ENV_LOCK.lock().unwrap();
        for raw in ["0", "501"] {
            match load_with_top_k(raw) {
                Err(ConfigError::OutOfRange(msg)) => assert!(msg.contains("RECOMMENDER_TOP_K")),
                other => panic!("expected OutOfRange for {}, got {:?}", raw, other),
            }
        }
    }

    #[test]
    fn test_top_k_bounds_accepted() {
        let _lock = ENV_LOCK.lock().unwrap();
        assert_eq!(load_with_top_k("1").unwrap().unwrap().top_k, 1);
        assert_eq!(load_with_top_k("500").unwrap().unwrap().top_k, MAX_TOP_K);
    }

    #[test]
    fn test_with_url_defaults() {
        let config = RecommenderConfig::with_url("http://recommender:8001");
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.top_k, 20);
        assert!(config.remote_library_root.is_none());
    }

    #[test]
    fn test_similar_url() {
        let config = RecommenderConfig::with_url("http://recommender:8001");
        assert_eq!(config.similar_url(), "http://recommender:8001/v1/music/similar");
    }

    #[test]
    fn test_similar_url_with_trailing_slash() {
        let config = RecommenderConfig::with_url("http://recommender:8001/");
        assert_eq!(config.similar_url(), "http://recommender:8001/v1/music/similar");
    }
}
