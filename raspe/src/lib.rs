//! # Raspe
//!
//! A scraper orchestration engine for public data sources.
//!
//! Raspe drives source adapters through a common pipeline:
//!
//! - **Parameter validation**: terms, page ranges, dates in any accepted
//!   notation, and per-source filters are checked before any request
//! - **Page discovery**: a probe request yields the page count, or the
//!   engine fetches until an empty page
//! - **Resilient fetching**: retries with backoff, per-source rate limits
//!   and daily quotas
//! - **Aggregation**: rows come back in term, page, in-page order, each
//!   tagged with the term that produced it
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use raspe::prelude::*;
//!
//! let engine = ScraperEngine::new(SenadoAdapter::new())?;
//! let result = engine
//!     .raspar(RawRequest::new(["saúde", "educação"]).with_pages(1..=2))
//!     .await?;
//! for row in &result {
//!     println!("{}", row["titulo"]);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod adapter;
pub mod aggregate;
pub mod config;
pub mod engine;
pub mod errors;
pub mod observability;
pub mod pagination;
pub mod params;
pub mod ratelimit;
pub mod retry;
pub mod sources;
pub mod testing;
pub mod transport;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapter::{PageCount, PaginationStrategy, SourceAdapter, SourceIdentity};
    pub use crate::aggregate::{AggregatedResult, PageResult, Record, TERM_COLUMN};
    pub use crate::config::{FetchConfig, ScraperConfig};
    pub use crate::engine::{
        CancellationToken, EngineConfig, FailurePolicy, ScraperEngine, ScraperEngineBuilder,
        TermFailure,
    };
    pub use crate::errors::{
        ApiError, ErrorContext, NetworkError, ParseError, QuotaExhaustedError, RateLimitError,
        ScraperError, ValidationError,
    };
    pub use crate::observability::{init_logging, LogFormat, LoggingConfig};
    pub use crate::params::{expand, DateFormat, PageRange, RawRequest, SearchRequest};
    pub use crate::ratelimit::{QuotaRegistry, RateLimitConfig};
    pub use crate::retry::RetryConfig;
    pub use crate::sources::{
        CamaraAdapter, CfmAdapter, CnjAdapter, FolhaAdapter, IpeaAdapter, NytAdapter,
        PresidenciaAdapter, SenadoAdapter, Source,
    };
    pub use crate::transport::{PageQuery, RawPage, Transport};
}
