//! Page discovery: which pages to fetch for a term.

use crate::adapter::{PageCount, PaginationStrategy, SourceAdapter};
use crate::engine::PageFetcher;
use crate::errors::{ErrorContext, ScraperError};
use crate::params::{PageRange, SearchRequest};
use crate::transport::RawPage;
use tracing::debug;

/// The pages to fetch for one term.
#[derive(Debug, Clone, PartialEq)]
pub enum PagePlan {
    /// A known, finite list of pages in ascending order.
    Pages {
        /// Page indices to fetch.
        pages: Vec<u32>,
        /// Probe response to reuse as page 1.
        probe: Option<RawPage>,
    },
    /// Fetch sequentially from `start` until a page comes back empty or
    /// `end` is reached.
    ProbeUntilEmpty {
        /// First page to fetch.
        start: u32,
        /// Last page allowed, if bounded.
        end: Option<u32>,
        /// Probe response to reuse as page 1.
        probe: Option<RawPage>,
    },
}

impl PagePlan {
    /// Intersects a page count with the requested range and the source's cap.
    #[must_use]
    pub fn resolve(
        count: PageCount,
        range: Option<PageRange>,
        cap: Option<u32>,
        probe: Option<RawPage>,
    ) -> Self {
        match count {
            PageCount::Exact(total) => {
                let total = cap.map_or(total, |cap| total.min(cap));
                let start = range.map_or(1, |r| r.start());
                let end = range.and_then(|r| r.end()).map_or(total, |end| end.min(total));
                let pages: Vec<u32> = (start..=end).collect();
                let probe = probe.filter(|_| pages.first() == Some(&1));
                Self::Pages { pages, probe }
            }
            PageCount::Unbounded => Self::unbounded(range, cap, probe),
        }
    }

    fn unbounded(range: Option<PageRange>, cap: Option<u32>, probe: Option<RawPage>) -> Self {
        let start = range.map_or(1, |r| r.start());
        let end = match (range.and_then(|r| r.end()), cap) {
            (Some(end), Some(cap)) => Some(end.min(cap)),
            (end, cap) => end.or(cap),
        };
        Self::ProbeUntilEmpty {
            start,
            end,
            probe: probe.filter(|_| start == 1),
        }
    }
}

/// Resolves a [`PagePlan`] for a term, probing the source when needed.
#[derive(Debug)]
pub struct PaginationDiscovery<'a> {
    fetcher: &'a PageFetcher,
}

impl<'a> PaginationDiscovery<'a> {
    /// Creates a discovery helper that probes through `fetcher`.
    #[must_use]
    pub const fn new(fetcher: &'a PageFetcher) -> Self {
        Self { fetcher }
    }

    /// Determines the pages to fetch for `term`.
    ///
    /// Probe-until-empty sources are resolved without any request. Bounded
    /// sources are probed through retry and rate limiting; a probe failure
    /// fails the term with the probe's error. When the probe request equals
    /// the page-1 request, the response is kept for reuse.
    pub async fn discover_page_count(
        &self,
        adapter: &dyn SourceAdapter,
        term: &str,
        request: &SearchRequest,
    ) -> Result<PagePlan, ScraperError> {
        let identity = adapter.identity();
        if identity.pagination == PaginationStrategy::ProbeUntilEmpty {
            return Ok(PagePlan::unbounded(request.pages(), identity.page_cap(), None));
        }

        let context = ErrorContext::for_source(&identity.name).with_term(term);
        let query = adapter.probe_query(term, request);
        let probe = self.fetcher.fetch(&query, &context).await?;
        let count = adapter
            .read_page_count(&probe, request)
            .map_err(|e| e.with_context(&context))?;
        debug!(term, ?count, "page count discovered");

        let reusable = query == adapter.build_query(term, 1, request);
        Ok(PagePlan::resolve(
            count,
            request.pages(),
            identity.page_cap(),
            reusable.then_some(probe),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pages(plan: &PagePlan) -> Vec<u32> {
        match plan {
            PagePlan::Pages { pages, .. } => pages.clone(),
            PagePlan::ProbeUntilEmpty { .. } => panic!("expected a bounded plan"),
        }
    }

    #[test]
    fn test_exact_count_without_range() {
        let plan = PagePlan::resolve(PageCount::Exact(3), None, None, None);
        assert_eq!(pages(&plan), vec![1, 2, 3]);
    }

    #[test]
    fn test_range_intersects_count() {
        let plan = PagePlan::resolve(PageCount::Exact(5), Some(PageRange::new(2, 9)), None, None);
        assert_eq!(pages(&plan), vec![2, 3, 4, 5]);

        let plan = PagePlan::resolve(PageCount::Exact(5), Some(PageRange::new(7, 9)), None, None);
        assert!(pages(&plan).is_empty());
    }

    #[test]
    fn test_zero_results_means_no_pages() {
        let plan = PagePlan::resolve(PageCount::Exact(0), None, None, Some(RawPage::ok("")));
        assert_eq!(
            plan,
            PagePlan::Pages {
                pages: vec![],
                probe: None
            }
        );
    }

    #[test]
    fn test_cap_limits_pages() {
        let plan = PagePlan::resolve(PageCount::Exact(250), None, Some(100), None);
        assert_eq!(pages(&plan).len(), 100);
    }

    #[test]
    fn test_probe_kept_only_when_page_one_is_fetched() {
        let probe = Some(RawPage::ok("page one"));
        match PagePlan::resolve(PageCount::Exact(3), None, None, probe.clone()) {
            PagePlan::Pages { probe, .. } => assert!(probe.is_some()),
            PagePlan::ProbeUntilEmpty { .. } => unreachable!(),
        }
        match PagePlan::resolve(PageCount::Exact(3), Some(PageRange::new(2, 3)), None, probe) {
            PagePlan::Pages { probe, .. } => assert!(probe.is_none()),
            PagePlan::ProbeUntilEmpty { .. } => unreachable!(),
        }
    }

    #[test]
    fn test_unbounded_count_falls_back_to_probing() {
        let plan = PagePlan::resolve(
            PageCount::Unbounded,
            Some(PageRange::starting_at(2)),
            Some(40),
            Some(RawPage::ok("page one")),
        );
        assert_eq!(
            plan,
            PagePlan::ProbeUntilEmpty {
                start: 2,
                end: Some(40),
                probe: None
            }
        );
    }
}
