//! A stub adapter for exercising the engine.

use crate::adapter::{PageCount, PaginationStrategy, SourceAdapter, SourceIdentity};
use crate::aggregate::{PageResult, Record};
use crate::errors::{ParseError, ScraperError, ValidationError};
use crate::params::SearchRequest;
use crate::ratelimit::RateLimitConfig;
use crate::transport::{PageQuery, RawPage};
use parking_lot::Mutex;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct StubBody {
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    items: Option<Vec<Record>>,
}

/// An adapter that talks to [`super::StubTransport`].
///
/// Queries look like `stub://<name>/search?q=<term>&page=<n>`; responses
/// are JSON objects with a `total` result count and an `items` array.
#[derive(Debug)]
pub struct StubAdapter {
    identity: SourceIdentity,
    required_filters: Vec<String>,
    warmup: Vec<PageQuery>,
    validate_calls: Mutex<usize>,
    build_calls: Mutex<usize>,
}

impl StubAdapter {
    fn new(name: &str, pagination: PaginationStrategy) -> Self {
        Self {
            identity: SourceIdentity::api(name, format!("stub://{name}/search"))
                .with_page_size(10)
                .with_pagination(pagination),
            required_filters: Vec::new(),
            warmup: Vec::new(),
            validate_calls: Mutex::new(0),
            build_calls: Mutex::new(0),
        }
    }

    /// A source that reports its result count.
    #[must_use]
    pub fn bounded(name: &str) -> Self {
        Self::new(name, PaginationStrategy::Bounded)
    }

    /// A source without a result count.
    #[must_use]
    pub fn probe_until_empty(name: &str) -> Self {
        Self::new(name, PaginationStrategy::ProbeUntilEmpty)
    }

    /// Rejects requests that lack `filter`.
    #[must_use]
    pub fn with_required_filter(mut self, filter: impl Into<String>) -> Self {
        self.required_filters.push(filter.into());
        self
    }

    /// Declares a rate limit for the source.
    #[must_use]
    pub fn with_rate_limit(mut self, limit: RateLimitConfig) -> Self {
        self.identity = self.identity.with_rate_limit(limit);
        self
    }

    /// Caps the reachable results.
    #[must_use]
    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.identity = self.identity.with_max_results(max_results);
        self
    }

    /// Adds a warm-up request.
    #[must_use]
    pub fn with_warmup(mut self, url: &str) -> Self {
        self.warmup.push(PageQuery::get(url));
        self
    }

    /// Number of times the source-specific validation hook ran.
    #[must_use]
    pub fn validate_calls(&self) -> usize {
        *self.validate_calls.lock()
    }

    /// Number of page queries built.
    #[must_use]
    pub fn build_calls(&self) -> usize {
        *self.build_calls.lock()
    }

    fn body(raw: &RawPage) -> Result<StubBody, ScraperError> {
        Ok(raw.json::<StubBody>()?)
    }
}

impl SourceAdapter for StubAdapter {
    fn identity(&self) -> &SourceIdentity {
        &self.identity
    }

    fn build_query(&self, term: &str, page: u32, _request: &SearchRequest) -> PageQuery {
        *self.build_calls.lock() += 1;
        PageQuery::get(self.identity.base_url.clone())
            .with_param("q", term)
            .with_param("page", page.to_string())
    }

    fn read_page_count(&self, probe: &RawPage, _request: &SearchRequest) -> Result<PageCount, ScraperError> {
        Ok(match Self::body(probe)?.total {
            Some(total) => PageCount::from_results(total, self.identity.page_size),
            None => PageCount::Unbounded,
        })
    }

    fn parse_page(&self, raw: &RawPage) -> Result<PageResult, ScraperError> {
        let items = Self::body(raw)?
            .items
            .ok_or_else(|| ParseError::new("response has no `items` array"))?;
        Ok(PageResult::new(items))
    }

    fn validate_source_params(&self, request: &SearchRequest) -> Result<(), ValidationError> {
        *self.validate_calls.lock() += 1;
        match self.required_filters.iter().find(|f| !request.filters().is_set(f)) {
            Some(filter) => Err(ValidationError::missing(filter.as_str())),
            None => Ok(()),
        }
    }

    fn warmup_queries(&self) -> Vec<PageQuery> {
        self.warmup.clone()
    }
}
