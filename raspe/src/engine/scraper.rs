//! The scraper orchestrator.

use super::cancellation::CancellationToken;
use super::config::EngineConfig;
use super::failure::{FailurePolicy, TermFailure};
use super::fetcher::{PageFetchTask, PageFetcher};
use crate::adapter::SourceAdapter;
use crate::aggregate::{AggregatedResult, PageResult, ResultAggregator, TermBatch};
use crate::config::{FetchConfig, ScraperConfig};
use crate::errors::{ErrorContext, ScraperError};
use crate::pagination::{PagePlan, PaginationDiscovery};
use crate::params::{ParameterValidator, RawRequest, SearchRequest};
use crate::ratelimit::{Clock, QuotaRegistry, RateLimiter, SystemClock};
use crate::retry::RetryPolicy;
use crate::transport::{RawPage, Transport};
use futures::stream::{self, StreamExt};
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Runs searches against one source.
///
/// The engine owns the fetch pipeline (transport, retry policy, rate
/// limiter) and drives the adapter through validation, page discovery,
/// page collection, and aggregation. It is reusable across calls; the
/// adapter's warm-up requests run once per engine.
#[derive(Debug)]
pub struct ScraperEngine {
    adapter: Arc<dyn SourceAdapter>,
    fetcher: PageFetcher,
    config: EngineConfig,
    validator: ParameterValidator,
    cancellation: Arc<CancellationToken>,
    clock: Arc<dyn Clock>,
    warmed_up: OnceCell<()>,
}

impl ScraperEngine {
    /// Starts building an engine for `adapter`.
    #[must_use]
    pub fn builder(adapter: impl SourceAdapter + 'static) -> ScraperEngineBuilder {
        ScraperEngineBuilder::new(Arc::new(adapter))
    }

    /// Builds an engine with default configuration and the HTTP transport.
    pub fn new(adapter: impl SourceAdapter + 'static) -> Result<Self, ScraperError> {
        Self::builder(adapter).build()
    }

    /// The adapter driven by this engine.
    #[must_use]
    pub fn adapter(&self) -> &dyn SourceAdapter {
        self.adapter.as_ref()
    }

    /// The orchestration settings.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Token that cancels in-flight and future runs.
    #[must_use]
    pub fn cancellation_token(&self) -> Arc<CancellationToken> {
        Arc::clone(&self.cancellation)
    }

    /// The source's rate limiter, if it declares ceilings.
    #[must_use]
    pub fn rate_limiter(&self) -> Option<&Arc<RateLimiter>> {
        self.fetcher.limiter()
    }

    /// Collects every record for every term of `request`.
    ///
    /// The request is validated before any network access. Rows come back
    /// in term order, then page order, then in-page order, each tagged with
    /// `termo_busca`. Under [`FailurePolicy::AbortAll`] the first failed
    /// term fails the call; under [`FailurePolicy::SkipFailedTerms`] it is
    /// recorded in [`AggregatedResult::failures`].
    #[instrument(
        name = "raspar",
        skip_all,
        fields(source = %self.adapter.identity().name, run_id = %Uuid::now_v7())
    )]
    pub async fn raspar(&self, request: RawRequest) -> Result<AggregatedResult, ScraperError> {
        let request = self.validator.validate(request, self.adapter.as_ref())?;
        self.warm_up().await;

        info!(terms = request.terms().len(), "scrape started");
        let request = &request;
        let outcomes = stream::iter(request.terms().iter().enumerate())
            .map(move |(index, term)| async move { (index, term, self.scrape_term(term, request).await) })
            .buffered(self.config.term_concurrency.max(1));
        futures::pin_mut!(outcomes);

        let mut aggregator = ResultAggregator::new();
        while let Some((index, term, outcome)) = outcomes.next().await {
            match outcome {
                Ok(batch) => aggregator.add(index, batch),
                Err(err @ ScraperError::Cancelled(_)) => return Err(err),
                Err(err) => match self.config.failure_policy {
                    FailurePolicy::AbortAll => {
                        error!(term = %term, error = %err, "term failed; aborting");
                        return Err(err);
                    }
                    FailurePolicy::SkipFailedTerms => {
                        warn!(term = %term, error = %err, "term failed; skipping");
                        aggregator.add_failure(TermFailure::new(index, term.as_str(), err));
                    }
                },
            }
        }

        let result = aggregator.finish();
        info!(rows = result.len(), failed_terms = result.failures().len(), "scrape finished");
        Ok(result)
    }

    /// Alias for [`ScraperEngine::raspar`].
    pub async fn scrape(&self, request: RawRequest) -> Result<AggregatedResult, ScraperError> {
        self.raspar(request).await
    }

    async fn warm_up(&self) {
        self.warmed_up
            .get_or_init(|| async {
                let context = ErrorContext::for_source(&self.adapter.identity().name);
                for query in self.adapter.warmup_queries() {
                    match self.fetcher.fetch(&query, &context).await {
                        Ok(_) => debug!(url = %query.url, "warm-up request done"),
                        Err(err) => warn!(url = %query.url, error = %err, "warm-up request failed"),
                    }
                }
            })
            .await;
    }

    #[instrument(skip_all, fields(term = %term))]
    async fn scrape_term(&self, term: &str, request: &SearchRequest) -> Result<TermBatch, ScraperError> {
        self.cancellation.check()?;
        let plan = PaginationDiscovery::new(&self.fetcher)
            .discover_page_count(self.adapter.as_ref(), term, request)
            .await?;

        let mut batch = TermBatch::new(term);
        match plan {
            PagePlan::Pages { pages, probe } => {
                debug!(pages = pages.len(), "collecting bounded page range");
                let mut probe = probe;
                let fetches = stream::iter(pages)
                    .map(move |page| {
                        let cached = if page == 1 { probe.take() } else { None };
                        self.collect_page(PageFetchTask::new(term, page, request), cached)
                    })
                    .buffered(self.config.page_concurrency.max(1));
                futures::pin_mut!(fetches);
                while let Some(outcome) = fetches.next().await {
                    let (page, result) = outcome?;
                    batch.insert(page, result);
                }
            }
            PagePlan::ProbeUntilEmpty { start, end, probe } => {
                let ceiling = start.saturating_add(self.config.max_unbounded_pages.saturating_sub(1));
                let last = end.map_or(ceiling, |end| end.min(ceiling));
                debug!(start, last, "collecting until an empty page");
                let mut probe = probe;
                let mut page = start;
                while page <= last {
                    let (_, result) = self.collect_page(PageFetchTask::new(term, page, request), probe.take()).await?;
                    if result.is_empty() {
                        debug!(page, "empty page; stopping");
                        break;
                    }
                    batch.insert(page, result);
                    page += 1;
                }
                if page > last && end.is_none() {
                    warn!(pages = self.config.max_unbounded_pages, "stopped at the page ceiling");
                }
            }
        }

        info!(rows = batch.record_count(), "term collected");
        Ok(batch)
    }

    async fn collect_page(
        &self,
        task: PageFetchTask<'_>,
        cached: Option<RawPage>,
    ) -> Result<(u32, PageResult), ScraperError> {
        self.cancellation.check()?;
        let context = task.context(&self.adapter.identity().name);

        let raw = match cached {
            Some(raw) => raw,
            None => {
                tokio::select! {
                    () = self.clock.sleep(self.config.page_delay()) => {}
                    () = self.cancellation.cancelled() => {}
                }
                self.cancellation.check()?;
                let query = task.query(self.adapter.as_ref());
                self.fetcher.fetch(&query, &context).await?
            }
        };

        let result = self
            .adapter
            .parse_page(&raw)
            .map_err(|e| e.with_context(&context))?;
        debug!(page = task.page(), records = result.len(), "page parsed");
        Ok((task.page(), result))
    }
}

/// Builder for [`ScraperEngine`].
pub struct ScraperEngineBuilder {
    adapter: Arc<dyn SourceAdapter>,
    config: ScraperConfig,
    transport: Option<Arc<dyn Transport>>,
    clock: Option<Arc<dyn Clock>>,
    registry: Option<Arc<QuotaRegistry>>,
    cancellation: Option<Arc<CancellationToken>>,
}

impl ScraperEngineBuilder {
    /// Creates a builder for a shared adapter.
    #[must_use]
    pub fn new(adapter: Arc<dyn SourceAdapter>) -> Self {
        Self {
            adapter,
            config: ScraperConfig::default(),
            transport: None,
            clock: None,
            registry: None,
            cancellation: None,
        }
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn config(mut self, config: ScraperConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the orchestration settings.
    #[must_use]
    pub fn engine_config(mut self, engine: EngineConfig) -> Self {
        self.config.engine = engine;
        self
    }

    /// Sets the retry settings.
    #[must_use]
    pub fn retry(mut self, retry: crate::retry::RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Sets the HTTP client settings.
    #[must_use]
    pub fn fetch_config(mut self, fetch: FetchConfig) -> Self {
        self.config.fetch = fetch;
        self
    }

    /// Uses a custom transport instead of the HTTP one.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Uses a custom clock for backoff, delays, and rate limiting.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Shares quota with other engines built from `registry`.
    #[must_use]
    pub fn quota_registry(mut self, registry: Arc<QuotaRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Uses an externally owned cancellation token.
    #[must_use]
    pub fn cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Builds the engine.
    pub fn build(self) -> Result<ScraperEngine, ScraperError> {
        let identity = self.adapter.identity();
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport(&self.config.fetch)?,
        };

        let limits = self
            .config
            .rate_limit_for(&identity.name)
            .or(identity.rate_limit)
            .filter(|limits| !limits.is_unlimited());
        let limiter = limits.map(|limits| match &self.registry {
            Some(registry) => registry.limiter(&identity.name, limits),
            None => Arc::new(RateLimiter::with_clock(&identity.name, limits, Arc::clone(&clock))),
        });

        let retry = RetryPolicy::new(self.config.retry.clone())
            .with_clock(Arc::clone(&clock))
            .with_limiter(limiter.clone());
        let fetcher = PageFetcher::new(transport, retry, limiter, Arc::clone(&clock));

        debug!(source = %identity.name, "engine built");
        Ok(ScraperEngine {
            adapter: self.adapter,
            fetcher,
            config: self.config.engine,
            validator: ParameterValidator::new(),
            cancellation: self.cancellation.unwrap_or_default(),
            clock,
            warmed_up: OnceCell::new(),
        })
    }
}

impl fmt::Debug for ScraperEngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScraperEngineBuilder")
            .field("adapter", &self.adapter)
            .field("config", &self.config)
            .field("custom_transport", &self.transport.is_some())
            .field("registry", &self.registry)
            .field("cancellation", &self.cancellation)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "http")]
fn default_transport(fetch: &FetchConfig) -> Result<Arc<dyn Transport>, ScraperError> {
    Ok(Arc::new(crate::transport::HttpTransport::new(fetch.clone())?))
}

#[cfg(not(feature = "http"))]
fn default_transport(_fetch: &FetchConfig) -> Result<Arc<dyn Transport>, ScraperError> {
    Err(ScraperError::Config(
        "no transport configured; enable the `http` feature or supply one".to_string(),
    ))
}
