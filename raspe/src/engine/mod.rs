//! Scrape orchestration.
//!
//! This module provides:
//! - [`ScraperEngine`], the `raspar` entry point
//! - [`PageFetcher`], the rate-limited, retried fetch pipeline
//! - Failure policy, cancellation, and engine settings

mod cancellation;
mod config;
mod failure;
mod fetcher;
mod scraper;


pub use cancellation::CancellationToken;
pub use config::EngineConfig;
pub use failure::{FailurePolicy, TermFailure};
pub use fetcher::{PageFetchTask, PageFetcher};
pub use scraper::{ScraperEngine, ScraperEngineBuilder};
