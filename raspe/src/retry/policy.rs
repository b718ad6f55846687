//! Bounded retry with exponential backoff and jitter.
//!
//! Every network unit of work (probe, page fetch, warm-up) runs inside
//! [`RetryPolicy::execute`]. Only errors for which
//! [`ScraperError::is_retryable`] holds are retried; when the attempt budget
//! is spent the task fails with an exhausted [`NetworkError`].

use crate::errors::{ErrorContext, NetworkError, ScraperError};
use crate::ratelimit::{Clock, RateLimiter, SystemClock};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base * 2^(attempt - 1)
    #[default]
    Exponential,
    /// delay = base * attempt
    Linear,
    /// delay = base
    Constant,
}

/// Jitter applied on top of the backoff delay. Never exceeds the delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    None,
    /// Random from 0 to delay
    Full,
    /// Half fixed, half random
    #[default]
    Equal,
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Cap on the backoff delay in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Backoff strategy.
    #[serde(default)]
    pub backoff_strategy: BackoffStrategy,
    /// Jitter strategy.
    #[serde(default)]
    pub jitter_strategy: JitterStrategy,
    /// Wait at least as long as the server's `Retry-After`.
    #[serde(default = "default_respect_retry_after")]
    pub respect_retry_after: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_respect_retry_after() -> bool {
    true
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_strategy: BackoffStrategy::default(),
            jitter_strategy: JitterStrategy::default(),
            respect_retry_after: default_respect_retry_after(),
        }
    }
}

impl RetryConfig {
    /// Creates a new retry config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub const fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub const fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub const fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff_strategy = strategy;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub const fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter_strategy = strategy;
        self
    }

    /// Sets whether `Retry-After` is honored.
    #[must_use]
    pub const fn with_respect_retry_after(mut self, respect: bool) -> Self {
        self.respect_retry_after = respect;
        self
    }

    /// Attempt budget, never below one.
    #[must_use]
    pub fn attempt_budget(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// State for one task's retries.
#[derive(Debug, Clone)]
pub struct RetryState {
    /// Attempts made so far.
    pub attempt: u32,
    /// Total time spent backing off.
    pub total_backoff: Duration,
    /// When the first attempt started.
    pub started_at: DateTime<Utc>,
}

impl RetryState {
    /// Creates a fresh state.
    #[must_use]
    pub const fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            attempt: 0,
            total_backoff: Duration::ZERO,
            started_at,
        }
    }

    /// Returns true once the attempt budget is spent.
    #[must_use]
    pub fn is_exhausted(&self, config: &RetryConfig) -> bool {
        self.attempt >= config.attempt_budget()
    }

    /// Backoff before the next attempt, jitter included.
    #[must_use]
    pub fn calculate_delay(&self, config: &RetryConfig) -> Duration {
        let base = config.base_delay_ms;
        let max = config.max_delay_ms;
        let step = self.attempt.saturating_sub(1);

        let delay = match config.backoff_strategy {
            BackoffStrategy::Exponential => base.saturating_mul(2u64.saturating_pow(step)),
            BackoffStrategy::Linear => base.saturating_mul(u64::from(step) + 1),
            BackoffStrategy::Constant => base,
        }
        .min(max);

        let jittered = match config.jitter_strategy {
            JitterStrategy::None => delay,
            JitterStrategy::Full => {
                if delay == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=delay)
                }
            }
            JitterStrategy::Equal => {
                let half = delay / 2;
                if half == 0 {
                    delay
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
        };

        Duration::from_millis(jittered)
    }
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry(Duration),
    /// No more retries, give up.
    GiveUp,
    /// Don't retry, the error is not retryable.
    NotRetryable,
}

/// Runs units of network work with bounded retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    clock: Arc<dyn Clock>,
    limiter: Option<Arc<RateLimiter>>,
}

impl RetryPolicy {
    /// Creates a policy on the system clock.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            limiter: None,
        }
    }

    /// Uses a different clock for backoff sleeps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Penalizes `limiter` whenever the source throttles us.
    #[must_use]
    pub fn with_limiter(mut self, limiter: Option<Arc<RateLimiter>>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Decides what to do after `error` on the attempt recorded in `state`.
    #[must_use]
    pub fn decide(&self, state: &RetryState, error: &ScraperError) -> RetryDecision {
        if !error.is_retryable() {
            return RetryDecision::NotRetryable;
        }
        if state.is_exhausted(&self.config) {
            return RetryDecision::GiveUp;
        }

        let mut delay = state.calculate_delay(&self.config);
        if let ScraperError::RateLimit(e) = error {
            if self.config.respect_retry_after {
                delay = delay.max(e.retry_after.unwrap_or_default());
            }
        }
        RetryDecision::Retry(delay)
    }

    /// Runs `task` until it succeeds, fails fatally, or exhausts the budget.
    ///
    /// Errors leave with `context` merged into their provenance.
    pub async fn execute<T, F, Fut>(&self, context: &ErrorContext, mut task: F) -> Result<T, ScraperError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ScraperError>>,
    {
        let mut state = RetryState::new(self.clock.now());

        loop {
            state.attempt += 1;
            let error = match task().await {
                Ok(value) => {
                    if state.attempt > 1 {
                        debug!(attempt = state.attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            match self.decide(&state, &error) {
                RetryDecision::NotRetryable => return Err(error.with_context(context)),
                RetryDecision::GiveUp => {
                    warn!(attempts = state.attempt, error = %error, "retry budget exhausted");
                    let exhausted = ScraperError::from(NetworkError::exhausted(state.attempt, &error));
                    return Err(exhausted.with_context(context));
                }
                RetryDecision::Retry(delay) => {
                    if matches!(error, ScraperError::RateLimit(_)) {
                        if let Some(limiter) = &self.limiter {
                            limiter.penalize(delay);
                        }
                    }
                    debug!(
                        attempt = state.attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "retrying after error"
                    );
                    state.total_backoff += delay;
                    self.clock.sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ApiError, ParseError, RateLimitError};
    use crate::ratelimit::{ManualClock, RateLimitConfig};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn no_jitter(attempts: u32) -> RetryConfig {
        RetryConfig::new()
            .with_max_attempts(attempts)
            .with_base_delay_ms(100)
            .with_jitter(JitterStrategy::None)
    }

    fn policy(config: RetryConfig) -> (Arc<ManualClock>, RetryPolicy) {
        let clock = Arc::new(ManualClock::default());
        (clock.clone(), RetryPolicy::new(config).with_clock(clock))
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay_ms, 1000);
        assert_eq!(config.max_delay_ms, 30000);
        assert_eq!(config.jitter_strategy, JitterStrategy::Equal);
        assert!(config.respect_retry_after);
    }

    #[test]
    fn test_exponential_delay_no_jitter() {
        let config = no_jitter(5).with_max_delay_ms(350);
        let mut state = RetryState::new(Utc::now());
        let mut delays = Vec::new();
        for attempt in 1..=4 {
            state.attempt = attempt;
            delays.push(state.calculate_delay(&config).as_millis());
        }
        assert_eq!(delays, vec![100, 200, 350, 350]);
    }

    #[test]
    fn test_jitter_is_bounded() {
        let config = RetryConfig::new().with_base_delay_ms(1000);
        let mut state = RetryState::new(Utc::now());
        state.attempt = 2;
        for _ in 0..100 {
            let delay = state.calculate_delay(&config).as_millis();
            assert!((1000..=2000).contains(&delay));
        }
    }

    #[tokio::test]
    async fn test_retries_exactly_up_to_max_then_network_error() {
        let (clock, policy) = policy(no_jitter(4));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .execute(&ErrorContext::for_source("stub"), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(NetworkError::new("connection reset").into())
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(clock.sleeps().len(), 3);
        match result.unwrap_err() {
            ScraperError::Network(e) => {
                assert!(e.exhausted);
                assert_eq!(e.attempts, 4);
                assert_eq!(e.context.source.as_deref(), Some("stub"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fatal_errors_are_not_retried() {
        let (_clock, policy) = policy(no_jitter(5));
        for fatal in [
            ScraperError::from(ApiError::new(404, "not found")),
            ScraperError::from(ParseError::new("missing listing")),
        ] {
            let calls = AtomicU32::new(0);
            let result: Result<(), _> = policy
                .execute(&ErrorContext::new(), || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let err = fatal.clone();
                    async move { Err(err) }
                })
                .await;
            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert_eq!(result.unwrap_err().kind(), fatal.kind());
        }
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let (_clock, policy) = policy(no_jitter(3));
        let calls = AtomicU32::new(0);

        let value = policy
            .execute(&ErrorContext::new(), || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(NetworkError::timeout("read timed out").into())
                } else {
                    Ok(42)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_honors_retry_after_and_penalizes_limiter() {
        let clock = Arc::new(ManualClock::default());
        let limiter = Arc::new(RateLimiter::with_clock(
            "stub",
            RateLimitConfig::new().with_per_minute(100),
            clock.clone(),
        ));
        let policy = RetryPolicy::new(no_jitter(2))
            .with_clock(clock.clone())
            .with_limiter(Some(limiter.clone()));
        let calls = AtomicU32::new(0);

        let value = policy
            .execute(&ErrorContext::new(), || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(RateLimitError::new(429, Some(Duration::from_secs(20))).into())
                } else {
                    Ok("page")
                }
            })
            .await
            .unwrap();

        assert_eq!(value, "page");
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(20)]);
        // The penalty has elapsed by the time the retry ran.
        limiter.acquire().await.unwrap();
        assert_eq!(clock.sleeps().len(), 1);
    }
}
