//! Orchestration settings.

use super::failure::FailurePolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the engine schedules terms and pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Terms collected concurrently.
    #[serde(default = "default_concurrency")]
    pub term_concurrency: usize,
    /// Pages of one term fetched concurrently (bounded plans only).
    #[serde(default = "default_concurrency")]
    pub page_concurrency: usize,
    /// Politeness delay before each page request, in milliseconds.
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    /// What to do when a term fails.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// Safety ceiling on pages fetched by probe-until-empty plans.
    #[serde(default = "default_max_unbounded_pages")]
    pub max_unbounded_pages: u32,
}

fn default_concurrency() -> usize {
    1
}

fn default_page_delay_ms() -> u64 {
    2000
}

fn default_max_unbounded_pages() -> u32 {
    500
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            term_concurrency: default_concurrency(),
            page_concurrency: default_concurrency(),
            page_delay_ms: default_page_delay_ms(),
            failure_policy: FailurePolicy::default(),
            max_unbounded_pages: default_max_unbounded_pages(),
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets term-level concurrency.
    #[must_use]
    pub const fn with_term_concurrency(mut self, concurrency: usize) -> Self {
        self.term_concurrency = concurrency;
        self
    }

    /// Sets page-level concurrency.
    #[must_use]
    pub const fn with_page_concurrency(mut self, concurrency: usize) -> Self {
        self.page_concurrency = concurrency;
        self
    }

    /// Sets the politeness delay.
    #[must_use]
    pub const fn with_page_delay_ms(mut self, delay: u64) -> Self {
        self.page_delay_ms = delay;
        self
    }

    /// Sets the failure policy.
    #[must_use]
    pub const fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Sets the probe-until-empty page ceiling.
    #[must_use]
    pub const fn with_max_unbounded_pages(mut self, pages: u32) -> Self {
        self.max_unbounded_pages = pages;
        self
    }

    /// Politeness delay as a Duration.
    #[must_use]
    pub const fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.page_delay(), Duration::from_millis(2000));
        assert_eq!(config.failure_policy, FailurePolicy::AbortAll);
        assert_eq!(config.max_unbounded_pages, 500);
        assert_eq!(config.term_concurrency, 1);
        assert_eq!(config.page_concurrency, 1);
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
