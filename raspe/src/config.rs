//! Configuration types for fetching and orchestration.

use crate::engine::EngineConfig;
use crate::errors::ScraperError;
use crate::observability::LoggingConfig;
use crate::ratelimit::RateLimitConfig;
use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Configuration for HTTP fetching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Read timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: f64,
    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: f64,
    /// Maximum number of redirects to follow.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Headers sent with every request.
    #[serde(default = "default_headers")]
    pub headers: HashMap<String, String>,
}

fn default_timeout() -> f64 {
    30.0
}

fn default_connect_timeout() -> f64 {
    10.0
}

fn default_max_redirects() -> usize {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/119.0".to_string()
}

fn default_headers() -> HashMap<String, String> {
    [
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
        ("Accept-Language", "pt-BR,pt;q=0.8,en-US;q=0.5,en;q=0.3"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
            headers: default_headers(),
        }
    }
}

impl FetchConfig {
    /// Creates a new fetch configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the read timeout.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, seconds: f64) -> Self {
        self.connect_timeout_seconds = seconds;
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Read timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds.max(0.0))
    }

    /// Connect timeout as a Duration.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.connect_timeout_seconds.max(0.0))
    }
}

/// Top-level configuration, loadable from JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// HTTP client settings.
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Retry policy settings.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Orchestration settings.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Per-source rate-limit overrides, keyed by source name.
    #[serde(default)]
    pub rate_limits: HashMap<String, RateLimitConfig>,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ScraperConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ScraperError> {
        serde_json::from_str(json).map_err(|e| ScraperError::Config(format!("invalid configuration: {e}")))
    }

    /// Reads and parses a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ScraperError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ScraperError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&contents)
    }

    /// Sets the fetch configuration.
    #[must_use]
    pub fn with_fetch(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }

    /// Sets the retry configuration.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Overrides the rate limit for one source.
    #[must_use]
    pub fn with_rate_limit(mut self, source: impl Into<String>, limit: RateLimitConfig) -> Self {
        self.rate_limits.insert(source.into(), limit);
        self
    }

    /// Returns the rate-limit override for a source, if any.
    #[must_use]
    pub fn rate_limit_for(&self, source: &str) -> Option<RateLimitConfig> {
        self.rate_limits.get(source).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FailurePolicy;

    #[test]
    fn test_fetch_defaults() {
        let config = FetchConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert!(config.headers.contains_key("Accept-Language"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ScraperConfig::from_json_str(
            r#"{
                "retry": {"max_attempts": 5},
                "engine": {"failure_policy": "skip_failed_terms", "page_delay_ms": 0},
                "rate_limits": {"nyt": {"per_minute": 5, "per_day": 500}}
            }"#,
        )
        .unwrap();

        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, RetryConfig::default().base_delay_ms);
        assert_eq!(config.engine.failure_policy, FailurePolicy::SkipFailedTerms);
        assert_eq!(config.engine.page_delay(), Duration::ZERO);
        assert_eq!(config.fetch, FetchConfig::default());
        assert_eq!(config.logging, LoggingConfig::default());
        assert_eq!(
            config.rate_limit_for("nyt"),
            Some(RateLimitConfig::new().with_per_minute(5).with_per_day(500))
        );
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = ScraperConfig::from_json_str("{ not json").unwrap_err();
        assert_eq!(err.kind(), "ConfigError");
    }
}
