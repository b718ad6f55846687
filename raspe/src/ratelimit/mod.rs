//! Rate limiting and quota bookkeeping.
//!
//! This module provides:
//! - [`RateLimiter`], a rolling-minute and daily ceiling per source
//! - [`QuotaRegistry`], process-scoped sharing of limiters by source name
//! - The [`Clock`] abstraction with a real and a manual implementation

mod clock;
mod limiter;

pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::{QuotaRegistry, QuotaState, RateLimitConfig, RateLimiter};
