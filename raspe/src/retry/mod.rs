//! Retry policy and response classification.

mod classify;
mod policy;

pub use classify::classify_response;
pub use policy::{BackoffStrategy, JitterStrategy, RetryConfig, RetryDecision, RetryPolicy, RetryState};
