//! A single fetch pipeline: rate limit, send, classify, retry.

use crate::adapter::SourceAdapter;
use crate::errors::{ErrorContext, ScraperError};
use crate::params::SearchRequest;
use crate::ratelimit::{Clock, RateLimiter};
use crate::retry::{classify_response, RetryPolicy};
use crate::transport::{PageQuery, RawPage, Transport};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// One page of one term, as handed to the fetch pipeline.
#[derive(Debug, Clone, Copy)]
pub struct PageFetchTask<'a> {
    term: &'a str,
    page: u32,
    request: &'a SearchRequest,
}

impl<'a> PageFetchTask<'a> {
    /// Creates a task for `page` of `term`.
    #[must_use]
    pub const fn new(term: &'a str, page: u32, request: &'a SearchRequest) -> Self {
        Self { term, page, request }
    }

    /// The search term.
    #[must_use]
    pub const fn term(&self) -> &'a str {
        self.term
    }

    /// The 1-based page index.
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// The request this page belongs to.
    #[must_use]
    pub const fn request(&self) -> &'a SearchRequest {
        self.request
    }

    /// The adapter's request for this page.
    #[must_use]
    pub fn query(&self, adapter: &dyn SourceAdapter) -> PageQuery {
        adapter.build_query(self.term, self.page, self.request)
    }

    /// Provenance for errors raised while fetching or parsing this page.
    #[must_use]
    pub fn context(&self, source: &str) -> ErrorContext {
        ErrorContext::for_source(source)
            .with_term(self.term)
            .with_page(self.page)
    }
}

/// Fetches pages through the rate limiter and retry policy.
///
/// Each attempt, retries included, takes a rate-limiter slot.
#[derive(Clone)]
pub struct PageFetcher {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    limiter: Option<Arc<RateLimiter>>,
    clock: Arc<dyn Clock>,
}

impl PageFetcher {
    /// Creates a fetcher.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        retry: RetryPolicy,
        limiter: Option<Arc<RateLimiter>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            transport,
            retry,
            limiter,
            clock,
        }
    }

    /// The rate limiter, if the source has one.
    #[must_use]
    pub fn limiter(&self) -> Option<&Arc<RateLimiter>> {
        self.limiter.as_ref()
    }

    /// Fetches `query`, returning a 2xx/3xx response or a classified error
    /// carrying `context` and the request URL.
    pub async fn fetch(&self, query: &PageQuery, context: &ErrorContext) -> Result<RawPage, ScraperError> {
        let context = context.clone().with_url(query.url.clone());
        self.retry
            .execute(&context, || async {
                if let Some(limiter) = &self.limiter {
                    limiter.acquire().await?;
                }
                trace!(%query, "sending request");
                let page = self.transport.send(query).await?;
                classify_response(page, self.clock.now())
            })
            .await
    }
}

impl fmt::Debug for PageFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageFetcher")
            .field("retry", &self.retry)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::NetworkError;
    use crate::params::{ParameterValidator, RawRequest};
    use crate::ratelimit::{ManualClock, RateLimitConfig};
    use crate::retry::{JitterStrategy, RetryConfig};
    use crate::transport::MockTransport;

    fn fetcher(transport: MockTransport, limiter: Option<Arc<RateLimiter>>, clock: Arc<ManualClock>) -> PageFetcher {
        let retry = RetryPolicy::new(
            RetryConfig::new()
                .with_max_attempts(3)
                .with_base_delay_ms(10)
                .with_jitter(JitterStrategy::None),
        )
        .with_clock(clock.clone())
        .with_limiter(limiter.clone());
        PageFetcher::new(Arc::new(transport), retry, limiter, clock)
    }

    #[test]
    fn test_task_builds_query_and_context() {
        let adapter = crate::testing::StubAdapter::bounded("stub");
        let request = ParameterValidator::new().normalize(RawRequest::new("lei")).unwrap();
        let task = PageFetchTask::new("lei", 3, &request);

        assert_eq!(task.query(&adapter), adapter.build_query("lei", 3, &request));
        let context = task.context("stub");
        assert_eq!(context.term.as_deref(), Some("lei"));
        assert_eq!(context.page, Some(3));
    }

    #[tokio::test]
    async fn test_server_error_then_success() {
        let mut transport = MockTransport::new();
        let mut seq = mockall::Sequence::new();
        transport
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(RawPage::new(502, "bad gateway")));
        transport
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(RawPage::ok("<html>ok</html>")));

        let clock = Arc::new(ManualClock::default());
        let page = fetcher(transport, None, clock.clone())
            .fetch(&PageQuery::get("https://example.org"), &ErrorContext::new())
            .await
            .unwrap();

        assert_eq!(page.body, "<html>ok</html>");
        assert_eq!(clock.sleeps().len(), 1);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| Ok(RawPage::new(404, "not here")));

        let err = fetcher(transport, None, Arc::new(ManualClock::default()))
            .fetch(
                &PageQuery::get("https://example.org/x"),
                &ErrorContext::for_source("stub").with_term("t").with_page(2),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "APIError");
        let context = err.context().cloned().unwrap_or_default();
        assert_eq!(context.page, Some(2));
        assert_eq!(context.url.as_deref(), Some("https://example.org/x"));
    }

    #[tokio::test]
    async fn test_transport_failures_exhaust_budget() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(3)
            .returning(|_| Err(NetworkError::timeout("timed out")));

        let err = fetcher(transport, None, Arc::new(ManualClock::default()))
            .fetch(&PageQuery::get("https://example.org"), &ErrorContext::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ScraperError::Network(ref e) if e.exhausted && e.attempts == 3));
    }

    #[tokio::test]
    async fn test_every_attempt_takes_a_quota_slot() {
        let clock = Arc::new(ManualClock::default());
        let limiter = Arc::new(RateLimiter::with_clock(
            "stub",
            RateLimitConfig::new().with_per_day(2),
            clock.clone(),
        ));
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(2)
            .returning(|_| Ok(RawPage::new(500, "")));

        let err = fetcher(transport, Some(limiter.clone()), clock)
            .fetch(&PageQuery::get("https://example.org"), &ErrorContext::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "QuotaExhaustedError");
        assert_eq!(limiter.used_today(), 2);
    }
}
