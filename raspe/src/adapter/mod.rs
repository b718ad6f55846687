//! The source adapter contract.
//!
//! Each data source supplies a [`SourceAdapter`]: how to build the request
//! for a term and page, how to read the result count off a probe response,
//! and how to turn a response into records. Adapters never perform I/O; the
//! engine runs every request through retry and rate limiting.

pub mod html;

use crate::aggregate::PageResult;
use crate::errors::{ScraperError, ValidationError};
use crate::params::SearchRequest;
use crate::ratelimit::RateLimitConfig;
use crate::transport::{HttpMethod, PageQuery, RawPage};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// How a source delivers results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionKind {
    /// Server-rendered HTML listings.
    Html,
    /// A JSON API.
    Api,
}

/// How the engine learns which pages exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaginationStrategy {
    /// The probe response carries a result count.
    #[default]
    Bounded,
    /// No count is available; pages are fetched until one comes back empty.
    ProbeUntilEmpty,
}

/// Static description of a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceIdentity {
    /// Short unique name, used for quotas and logs.
    pub name: String,
    /// Search endpoint.
    pub base_url: String,
    /// HTML or API.
    pub kind: CollectionKind,
    /// What a record represents (e.g. "norma", "artigo").
    pub record_type: String,
    /// HTTP method for searches.
    pub method: HttpMethod,
    /// Records per result page.
    pub page_size: u32,
    /// Page discovery strategy.
    pub pagination: PaginationStrategy,
    /// Hard cap on reachable results, if the source imposes one.
    pub max_results: Option<u32>,
    /// Declared request ceilings.
    pub rate_limit: Option<RateLimitConfig>,
}

impl SourceIdentity {
    /// Describes an HTML source.
    #[must_use]
    pub fn html(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            kind: CollectionKind::Html,
            record_type: "registro".to_string(),
            method: HttpMethod::Get,
            page_size: 10,
            pagination: PaginationStrategy::Bounded,
            max_results: None,
            rate_limit: None,
        }
    }

    /// Describes a JSON API source.
    #[must_use]
    pub fn api(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            kind: CollectionKind::Api,
            ..Self::html(name, base_url)
        }
    }

    /// Sets the record type name.
    #[must_use]
    pub fn with_record_type(mut self, record_type: impl Into<String>) -> Self {
        self.record_type = record_type.into();
        self
    }

    /// Sets the HTTP method.
    #[must_use]
    pub const fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Sets the page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the pagination strategy.
    #[must_use]
    pub const fn with_pagination(mut self, pagination: PaginationStrategy) -> Self {
        self.pagination = pagination;
        self
    }

    /// Sets the hard result cap.
    #[must_use]
    pub const fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Declares request ceilings.
    #[must_use]
    pub const fn with_rate_limit(mut self, limit: RateLimitConfig) -> Self {
        self.rate_limit = Some(limit);
        self
    }

    /// Highest page reachable under the result cap.
    #[must_use]
    pub fn page_cap(&self) -> Option<u32> {
        self.max_results.map(|max| max.div_ceil(self.page_size.max(1)))
    }
}

/// What a probe response says about the number of pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCount {
    /// Exactly this many pages exist.
    Exact(u32),
    /// The response carries no usable count.
    Unbounded,
}

impl PageCount {
    /// Pages needed for `results` rows at `page_size` rows per page.
    #[must_use]
    pub fn from_results(results: u64, page_size: u32) -> Self {
        let pages = results.div_ceil(u64::from(page_size.max(1)));
        Self::Exact(u32::try_from(pages).unwrap_or(u32::MAX))
    }
}

/// The capability set every data source implements.
pub trait SourceAdapter: Send + Sync + Debug {
    /// Static description of the source.
    fn identity(&self) -> &SourceIdentity;

    /// Builds the request for one page. Must be pure.
    fn build_query(&self, term: &str, page: u32, request: &SearchRequest) -> PageQuery;

    /// Request whose response reveals the page count; page 1 by default.
    fn probe_query(&self, term: &str, request: &SearchRequest) -> PageQuery {
        self.build_query(term, 1, request)
    }

    /// Reads the page count off a probe response.
    fn read_page_count(&self, probe: &RawPage, request: &SearchRequest) -> Result<PageCount, ScraperError>;

    /// Extracts records from a response.
    ///
    /// A page the source marks as having no results is an empty
    /// [`PageResult`]; a page missing the expected structure is a
    /// [`crate::errors::ParseError`].
    fn parse_page(&self, raw: &RawPage) -> Result<PageResult, ScraperError>;

    /// Source-specific checks, run after the generic ones pass.
    fn validate_source_params(&self, _request: &SearchRequest) -> Result<(), ValidationError> {
        Ok(())
    }

    /// Requests to issue once before the first search, e.g. to obtain
    /// session cookies.
    fn warmup_queries(&self) -> Vec<PageQuery> {
        Vec::new()
    }
}
