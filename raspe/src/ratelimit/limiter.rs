//! Per-source request ceilings.

use super::clock::{to_chrono, Clock, SystemClock};
use crate::errors::QuotaExhaustedError;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const WINDOW: Duration = Duration::from_secs(60);

/// Request ceilings for one source. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests in any rolling 60-second window.
    #[serde(default)]
    pub per_minute: Option<u32>,
    /// Maximum requests per UTC calendar day.
    #[serde(default)]
    pub per_day: Option<u32>,
}

impl RateLimitConfig {
    /// Creates an unlimited configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-minute ceiling.
    #[must_use]
    pub const fn with_per_minute(mut self, limit: u32) -> Self {
        self.per_minute = Some(limit);
        self
    }

    /// Sets the daily ceiling.
    #[must_use]
    pub const fn with_per_day(mut self, limit: u32) -> Self {
        self.per_day = Some(limit);
        self
    }

    /// Returns true if neither ceiling is set.
    #[must_use]
    pub const fn is_unlimited(&self) -> bool {
        self.per_minute.is_none() && self.per_day.is_none()
    }
}

/// Mutable quota bookkeeping shared by every task hitting one source.
#[derive(Debug, Clone, Default)]
pub struct QuotaState {
    window: VecDeque<DateTime<Utc>>,
    day: Option<NaiveDate>,
    used_today: u32,
    penalty_until: Option<DateTime<Utc>>,
}

enum Admission {
    Granted,
    Wait(Duration),
}

/// Blocks callers until a request slot is free under the source's ceilings.
///
/// Daily exhaustion is reported immediately rather than waited out, since
/// the wait could be hours.
#[derive(Debug)]
pub struct RateLimiter {
    source: String,
    config: RateLimitConfig,
    state: Mutex<QuotaState>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Creates a limiter on the system clock.
    #[must_use]
    pub fn new(source: impl Into<String>, config: RateLimitConfig) -> Self {
        Self::with_clock(source, config, Arc::new(SystemClock))
    }

    /// Creates a limiter on a given clock.
    #[must_use]
    pub fn with_clock(source: impl Into<String>, config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            source: source.into(),
            config,
            state: Mutex::new(QuotaState::default()),
            clock,
        }
    }

    /// Name of the source this limiter guards.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The configured ceilings.
    #[must_use]
    pub const fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Waits for a free slot and records the request against the quota.
    pub async fn acquire(&self) -> Result<(), QuotaExhaustedError> {
        loop {
            match self.try_acquire()? {
                Admission::Granted => return Ok(()),
                Admission::Wait(wait) => {
                    debug!(
                        source = %self.source,
                        delay_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                        "waiting for rate limit slot"
                    );
                    self.clock.sleep(wait).await;
                }
            }
        }
    }

    fn try_acquire(&self) -> Result<Admission, QuotaExhaustedError> {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let today = now.date_naive();
        if state.day != Some(today) {
            state.day = Some(today);
            state.used_today = 0;
        }

        if let Some(limit) = self.config.per_day {
            if state.used_today >= limit {
                warn!(source = %self.source, limit, "daily quota exhausted");
                return Err(QuotaExhaustedError::new(&self.source, limit, state.used_today));
            }
        }

        if let Some(until) = state.penalty_until {
            if until > now {
                return Ok(Admission::Wait((until - now).to_std().unwrap_or_default()));
            }
            state.penalty_until = None;
        }

        if let Some(limit) = self.config.per_minute {
            let horizon = now - to_chrono(WINDOW);
            while state.window.front().is_some_and(|t| *t <= horizon) {
                state.window.pop_front();
            }
            if state.window.len() >= limit as usize {
                let oldest = state.window.front().copied().unwrap_or(now);
                let wait = (oldest + to_chrono(WINDOW) - now).to_std().unwrap_or_default();
                return Ok(Admission::Wait(wait));
            }
            state.window.push_back(now);
        }

        state.used_today += 1;
        Ok(Admission::Granted)
    }

    /// Blocks all callers for at least `wait`, e.g. after the source sent 429.
    pub fn penalize(&self, wait: Duration) {
        let until = self.clock.now() + to_chrono(wait);
        let mut state = self.state.lock();
        if state.penalty_until.map_or(true, |current| current < until) {
            state.penalty_until = Some(until);
        }
    }

    /// Requests recorded today.
    #[must_use]
    pub fn used_today(&self) -> u32 {
        self.state.lock().used_today
    }

    /// Requests recorded in the current rolling window.
    #[must_use]
    pub fn in_window(&self) -> usize {
        let horizon = self.clock.now() - to_chrono(WINDOW);
        self.state.lock().window.iter().filter(|t| **t > horizon).count()
    }
}

/// Hands out one shared [`RateLimiter`] per source name.
///
/// Engines built from the same registry share quota for as long as the
/// registry lives.
#[derive(Debug)]
pub struct QuotaRegistry {
    limiters: DashMap<String, Arc<RateLimiter>>,
    clock: Arc<dyn Clock>,
}

impl Default for QuotaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl QuotaRegistry {
    /// Creates a registry on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a registry whose limiters use `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            limiters: DashMap::new(),
            clock,
        }
    }

    /// Returns the limiter for `source`, creating it with `config` on first use.
    pub fn limiter(&self, source: &str, config: RateLimitConfig) -> Arc<RateLimiter> {
        self.limiters
            .entry(source.to_string())
            .or_insert_with(|| Arc::new(RateLimiter::with_clock(source, config, Arc::clone(&self.clock))))
            .clone()
    }

    /// Returns the limiter for `source` if one exists.
    #[must_use]
    pub fn get(&self, source: &str) -> Option<Arc<RateLimiter>> {
        self.limiters.get(source).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of sources with a limiter.
    #[must_use]
    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    /// Returns true if no limiter has been created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::ManualClock;

    fn limiter(config: RateLimitConfig) -> (Arc<ManualClock>, RateLimiter) {
        let clock = Arc::new(ManualClock::default());
        let limiter = RateLimiter::with_clock("nyt", config, clock.clone());
        (clock, limiter)
    }

    #[tokio::test]
    async fn test_never_more_than_n_in_rolling_window() {
        let (clock, limiter) = limiter(RateLimitConfig::new().with_per_minute(5));
        let mut granted_at = Vec::new();

        for i in 0..23 {
            limiter.acquire().await.unwrap();
            granted_at.push(clock.now());
            // Irregular spacing between requests.
            clock.advance(Duration::from_millis(700 * (i % 4)));
        }

        for pair in granted_at.windows(6) {
            assert!(pair[5] - pair[0] >= chrono::Duration::seconds(60));
        }
        assert!(limiter.in_window() <= 5);
    }

    #[tokio::test]
    async fn test_waits_only_when_window_full() {
        let (clock, limiter) = limiter(RateLimitConfig::new().with_per_minute(2));

        limiter.acquire().await.unwrap();
        limiter.acquire().await.unwrap();
        assert!(clock.sleeps().is_empty());

        limiter.acquire().await.unwrap();
        assert_eq!(clock.total_slept(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_daily_quota_exhaustion() {
        let (_clock, limiter) = limiter(RateLimitConfig::new().with_per_day(2));

        limiter.acquire().await.unwrap();
        limiter.acquire().await.unwrap();
        let err = limiter.acquire().await.unwrap_err();

        assert_eq!(err.limit, 2);
        assert_eq!(err.used, 2);
        assert_eq!(err.source_name, "nyt");
    }

    #[tokio::test]
    async fn test_daily_quota_resets_on_new_day() {
        let (clock, limiter) = limiter(RateLimitConfig::new().with_per_day(1));

        limiter.acquire().await.unwrap();
        assert!(limiter.acquire().await.is_err());

        clock.advance(Duration::from_secs(24 * 60 * 60));
        limiter.acquire().await.unwrap();
        assert_eq!(limiter.used_today(), 1);
    }

    #[tokio::test]
    async fn test_penalty_delays_next_acquire() {
        let (clock, limiter) = limiter(RateLimitConfig::new().with_per_minute(100));

        limiter.penalize(Duration::from_secs(12));
        limiter.acquire().await.unwrap();

        assert_eq!(clock.total_slept(), Duration::from_secs(12));
    }

    #[tokio::test]
    async fn test_registry_shares_limiter_per_source() {
        let registry = QuotaRegistry::with_clock(Arc::new(ManualClock::default()));
        let config = RateLimitConfig::new().with_per_day(2);

        registry.limiter("nyt", config).acquire().await.unwrap();
        registry.limiter("nyt", config).acquire().await.unwrap();

        assert!(registry.limiter("nyt", config).acquire().await.is_err());
        assert!(registry.limiter("senado", config).acquire().await.is_ok());
        assert_eq!(registry.len(), 2);
    }
}
