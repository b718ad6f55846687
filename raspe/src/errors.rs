//! Error types for the raspe scraper engine.
//!
//! Every failure the engine can surface is one of the kinds in
//! [`ScraperError`]. Transient kinds (network failures and rate limiting) are
//! retried by the retry policy; every other kind is fatal for the task that
//! raised it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Maximum number of response body characters kept on an [`ApiError`].
pub const MAX_RESPONSE_TEXT: usize = 500;

/// The main error type for raspe operations.
#[derive(Debug, Clone, Error)]
pub enum ScraperError {
    /// The request was rejected before any network call.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A transport failure (timeout, connection reset, 5xx).
    #[error("{0}")]
    Network(#[from] NetworkError),

    /// The source signalled throttling (HTTP 429 or equivalent).
    #[error("{0}")]
    RateLimit(#[from] RateLimitError),

    /// A daily quota was exhausted locally.
    #[error("{0}")]
    QuotaExhausted(#[from] QuotaExhaustedError),

    /// The response did not have the expected structure.
    #[error("{0}")]
    Parse(#[from] ParseError),

    /// A permanent HTTP client error (4xx other than 429).
    #[error("{0}")]
    Api(#[from] ApiError),

    /// The run was cancelled cooperatively.
    #[error("Scrape cancelled: {0}")]
    Cancelled(String),

    /// Invalid configuration (unreadable file, unbuildable client).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScraperError {
    /// Returns true if the retry policy may attempt the task again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => !e.exhausted,
            Self::RateLimit(_) => true,
            _ => false,
        }
    }

    /// Stable name of the error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Network(_) => "NetworkError",
            Self::RateLimit(_) => "RateLimitError",
            Self::QuotaExhausted(_) => "QuotaExhaustedError",
            Self::Parse(_) => "ParseError",
            Self::Api(_) => "APIError",
            Self::Cancelled(_) => "Cancelled",
            Self::Config(_) => "ConfigError",
            Self::Internal(_) => "InternalError",
        }
    }

    /// Returns the provenance attached to the error, if any.
    #[must_use]
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::Network(e) => Some(&e.context),
            Self::RateLimit(e) => Some(&e.context),
            Self::QuotaExhausted(e) => Some(&e.context),
            Self::Parse(e) => Some(&e.context),
            Self::Api(e) => Some(&e.context),
            _ => None,
        }
    }

    /// Fills in provenance fields the error does not carry yet.
    #[must_use]
    pub fn with_context(mut self, context: &ErrorContext) -> Self {
        match &mut self {
            Self::Network(e) => e.context.merge(context),
            Self::RateLimit(e) => e.context.merge(context),
            Self::QuotaExhausted(e) => e.context.merge(context),
            Self::Parse(e) => e.context.merge(context),
            Self::Api(e) => e.context.merge(context),
            _ => {}
        }
        self
    }

    /// Converts to a dictionary representation for structured reporting.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(self.kind()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map.insert("retryable".to_string(), serde_json::json!(self.is_retryable()));

        match self {
            Self::Network(e) => {
                map.insert("attempts".to_string(), serde_json::json!(e.attempts));
                map.insert("timed_out".to_string(), serde_json::json!(e.timed_out));
                if let Some(status) = e.status {
                    map.insert("status".to_string(), serde_json::json!(status));
                }
            }
            Self::RateLimit(e) => {
                map.insert("status".to_string(), serde_json::json!(e.status));
                if let Some(wait) = e.retry_after {
                    map.insert(
                        "retry_after_ms".to_string(),
                        serde_json::json!(u64::try_from(wait.as_millis()).unwrap_or(u64::MAX)),
                    );
                }
            }
            Self::QuotaExhausted(e) => {
                map.insert("source_name".to_string(), serde_json::json!(e.source_name));
                map.insert("limit".to_string(), serde_json::json!(e.limit));
                map.insert("used".to_string(), serde_json::json!(e.used));
            }
            Self::Api(e) => {
                map.insert("status".to_string(), serde_json::json!(e.status));
                map.insert("response_text".to_string(), serde_json::json!(e.response_text));
            }
            _ => {}
        }

        if let Some(context) = self.context().filter(|c| !c.is_empty()) {
            map.insert("context".to_string(), context.to_value());
        }

        map
    }
}

/// Provenance attached to errors raised while scraping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Source adapter name.
    pub source: Option<String>,
    /// Search term being collected.
    pub term: Option<String>,
    /// Page index (1-based) being fetched.
    pub page: Option<u32>,
    /// URL of the failing request.
    pub url: Option<String>,
}

impl ErrorContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context for a source.
    #[must_use]
    pub fn for_source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::default()
        }
    }

    /// Sets the search term.
    #[must_use]
    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = Some(term.into());
        self
    }

    /// Sets the page index.
    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Sets the request URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Returns true if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.term.is_none() && self.page.is_none() && self.url.is_none()
    }

    fn merge(&mut self, other: &Self) {
        if self.source.is_none() {
            self.source.clone_from(&other.source);
        }
        if self.term.is_none() {
            self.term.clone_from(&other.term);
        }
        if self.page.is_none() {
            self.page = other.page;
        }
        if self.url.is_none() {
            self.url.clone_from(&other.url);
        }
    }

    fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        let mut parts = Vec::new();
        if let Some(source) = &self.source {
            parts.push(format!("source={source}"));
        }
        if let Some(term) = &self.term {
            parts.push(format!("term={term:?}"));
        }
        if let Some(page) = self.page {
            parts.push(format!("page={page}"));
        }
        if let Some(url) = &self.url {
            parts.push(format!("url={url}"));
        }
        write!(f, " [{}]", parts.join(", "))
    }
}

/// Errors raised while validating a search request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A date string matched none of the accepted shapes.
    #[error("Invalid date format for '{field}': '{value}' (expected YYYY-MM-DD, DD/MM/YYYY or YYYYMMDD)")]
    InvalidDateFormat {
        /// The request field.
        field: String,
        /// The offending value.
        value: String,
    },

    /// A date string had a valid shape but is not a calendar date.
    #[error("Impossible date for '{field}': '{value}'")]
    ImpossibleDate {
        /// The request field.
        field: String,
        /// The offending value.
        value: String,
    },

    /// The start date falls after the end date.
    #[error("Start date {start} is after end date {end}")]
    ReversedDateRange {
        /// Canonical start date.
        start: NaiveDate,
        /// Canonical end date.
        end: NaiveDate,
    },

    /// No search terms were provided.
    #[error("At least one search term is required")]
    EmptySearchTerms,

    /// A search term was empty or whitespace.
    #[error("Search term at position {index} is blank")]
    BlankSearchTerm {
        /// Position of the term in the request.
        index: usize,
    },

    /// The page range is empty or starts below 1.
    #[error("Invalid page range {start}..={end}")]
    InvalidPageRange {
        /// First requested page.
        start: u32,
        /// Last requested page.
        end: u32,
    },

    /// Two filters that cannot be combined were both set.
    #[error("Filters '{first}' and '{second}' cannot be combined")]
    ConflictingFilters {
        /// First filter name.
        first: String,
        /// Second filter name.
        second: String,
    },

    /// A filter value is not one of the accepted choices.
    #[error("Invalid value '{value}' for '{field}' (allowed: {})", .allowed.join(", "))]
    InvalidChoice {
        /// The filter name.
        field: String,
        /// The offending value.
        value: String,
        /// Accepted values.
        allowed: Vec<String>,
    },

    /// A filter value could not be interpreted.
    #[error("Invalid value '{value}' for '{field}': expected {expected}")]
    InvalidValue {
        /// The filter name.
        field: String,
        /// The offending value.
        value: String,
        /// Description of the expected value.
        expected: String,
    },

    /// A parameter the source requires is absent.
    #[error("Missing required parameter '{name}'")]
    MissingParameter {
        /// The parameter name.
        name: String,
    },

    /// A boolean search expression could not be expanded.
    #[error("Invalid search expression '{expression}': {reason}")]
    InvalidExpression {
        /// The expression as given.
        expression: String,
        /// What went wrong.
        reason: String,
    },
}

impl ValidationError {
    /// Creates an invalid date format error.
    #[must_use]
    pub fn invalid_date_format(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidDateFormat {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates an impossible date error.
    #[must_use]
    pub fn impossible_date(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::ImpossibleDate {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates a conflicting filters error.
    #[must_use]
    pub fn conflicting(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self::ConflictingFilters {
            first: first.into(),
            second: second.into(),
        }
    }

    /// Creates an invalid choice error.
    #[must_use]
    pub fn invalid_choice(field: impl Into<String>, value: impl Into<String>, allowed: &[&str]) -> Self {
        Self::InvalidChoice {
            field: field.into(),
            value: value.into(),
            allowed: allowed.iter().map(ToString::to_string).collect(),
        }
    }

    /// Creates an invalid value error.
    #[must_use]
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Creates a missing parameter error.
    #[must_use]
    pub fn missing(name: impl Into<String>) -> Self {
        Self::MissingParameter { name: name.into() }
    }

    /// Creates an invalid expression error.
    #[must_use]
    pub fn invalid_expression(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidExpression {
            expression: expression.into(),
            reason: reason.into(),
        }
    }
}

/// A transport-level failure.
#[derive(Debug, Clone, Error)]
#[error("Network error{context}: {message}")]
pub struct NetworkError {
    /// Description of the failure.
    pub message: String,
    /// Where the failure happened.
    pub context: ErrorContext,
    /// Attempts made before surfacing (0 when raised by the transport).
    pub attempts: u32,
    /// Whether the failure was a timeout.
    pub timed_out: bool,
    /// HTTP status for server errors.
    pub status: Option<u16>,
    /// Set once the retry budget is spent; no longer retryable.
    pub exhausted: bool,
}

impl NetworkError {
    /// Creates a new network error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: ErrorContext::default(),
            attempts: 0,
            timed_out: false,
            status: None,
            exhausted: false,
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            timed_out: true,
            ..Self::new(message)
        }
    }

    /// Creates an error for a 5xx response.
    #[must_use]
    pub fn server_error(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::new(format!("server responded with HTTP {status}"))
        }
    }

    /// Creates the error surfaced once the retry budget is spent.
    #[must_use]
    pub fn exhausted(attempts: u32, last: &ScraperError) -> Self {
        let (status, timed_out, context) = match last {
            ScraperError::Network(e) => (e.status, e.timed_out, e.context.clone()),
            ScraperError::RateLimit(e) => (Some(e.status), false, e.context.clone()),
            other => (None, false, other.context().cloned().unwrap_or_default()),
        };
        Self {
            message: format!("gave up after {attempts} attempts; last failure: {last}"),
            context,
            attempts,
            timed_out,
            status,
            exhausted: true,
        }
    }

    /// Sets the context.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }
}

/// The source asked the client to slow down.
#[derive(Debug, Clone, Error)]
#[error("Rate limited by source{context} (HTTP {status}): {message}")]
pub struct RateLimitError {
    /// Description of the throttle.
    pub message: String,
    /// Server-suggested wait, from `Retry-After`.
    pub retry_after: Option<Duration>,
    /// HTTP status (429, or 503 with `Retry-After`).
    pub status: u16,
    /// Where the failure happened.
    pub context: ErrorContext,
}

impl RateLimitError {
    /// Creates a new rate limit error.
    #[must_use]
    pub fn new(status: u16, retry_after: Option<Duration>) -> Self {
        let message = retry_after.map_or_else(
            || "no Retry-After given".to_string(),
            |wait| format!("retry after {}s", wait.as_secs()),
        );
        Self {
            message,
            retry_after,
            status,
            context: ErrorContext::default(),
        }
    }
}

/// The local daily quota for a source is spent.
#[derive(Debug, Clone, Error)]
#[error("Daily quota exhausted for '{source_name}'{context}: {used}/{limit} requests used")]
pub struct QuotaExhaustedError {
    /// The source whose quota ran out.
    pub source_name: String,
    /// Daily ceiling.
    pub limit: u32,
    /// Requests counted today.
    pub used: u32,
    /// Where the failure happened.
    pub context: ErrorContext,
}

impl QuotaExhaustedError {
    /// Creates a new quota exhausted error.
    #[must_use]
    pub fn new(source_name: impl Into<String>, limit: u32, used: u32) -> Self {
        Self {
            source_name: source_name.into(),
            limit,
            used,
            context: ErrorContext::default(),
        }
    }
}

/// A response lacked the structure the adapter expects.
#[derive(Debug, Clone, Error)]
#[error("Parse error{context}: {message}")]
pub struct ParseError {
    /// What was missing or malformed.
    pub message: String,
    /// Where the failure happened.
    pub context: ErrorContext,
}

impl ParseError {
    /// Creates a new parse error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }
}

/// A permanent HTTP client error.
#[derive(Debug, Clone, Error)]
#[error("API error{context} (HTTP {status}): {message}")]
pub struct ApiError {
    /// HTTP status code.
    pub status: u16,
    /// Short description.
    pub message: String,
    /// Response body, truncated to [`MAX_RESPONSE_TEXT`] characters.
    pub response_text: String,
    /// Where the failure happened.
    pub context: ErrorContext,
}

impl ApiError {
    /// Creates a new API error, truncating the response body.
    #[must_use]
    pub fn new(status: u16, response_text: &str) -> Self {
        Self {
            status,
            message: format!("request rejected with HTTP {status}"),
            response_text: response_text.chars().take(MAX_RESPONSE_TEXT).collect(),
            context: ErrorContext::default(),
        }
    }
}
