//! An in-memory transport serving a fixed catalog.

use crate::aggregate::{record, Record};
use crate::errors::NetworkError;
use crate::transport::{PageQuery, RawPage, Transport};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;

/// Builds the record a [`StubTransport`] catalog holds for `term`, `page`, `row`.
#[must_use]
pub fn stub_record(term: &str, page: u32, row: u32) -> Record {
    record([
        ("id", format!("{term}-{page}-{row}")),
        ("titulo", format!("Resultado {row} da página {page}")),
    ])
}

#[derive(Debug, Clone, Copy)]
struct Fault {
    status: u16,
    remaining: Option<usize>,
}

/// Serves the JSON that [`super::StubAdapter`] reads.
///
/// Each term maps to a list of pages. Pages past the end come back empty;
/// unknown terms report zero results.
#[derive(Debug, Default)]
pub struct StubTransport {
    catalog: HashMap<String, Vec<Vec<Record>>>,
    hide_totals: bool,
    yields: HashMap<String, usize>,
    faults: Mutex<HashMap<String, Fault>>,
    calls: Mutex<Vec<PageQuery>>,
}

impl StubTransport {
    /// Creates an empty transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `pages` full pages of `per_page` generated records for `term`.
    #[must_use]
    pub fn with_term(mut self, term: &str, pages: u32, per_page: u32) -> Self {
        let pages = (1..=pages)
            .map(|page| (1..=per_page).map(|row| stub_record(term, page, row)).collect())
            .collect();
        self.catalog.insert(term.to_string(), pages);
        self
    }

    /// Adds explicit pages for `term`.
    #[must_use]
    pub fn with_pages(mut self, term: &str, pages: Vec<Vec<Record>>) -> Self {
        self.catalog.insert(term.to_string(), pages);
        self
    }

    /// Omits the `total` field so counts cannot be read.
    #[must_use]
    pub const fn without_totals(mut self) -> Self {
        self.hide_totals = true;
        self
    }

    /// Makes responses for `term` yield to the scheduler `times` times,
    /// so concurrent terms complete out of order.
    #[must_use]
    pub fn with_latency(mut self, term: &str, times: usize) -> Self {
        self.yields.insert(term.to_string(), times);
        self
    }

    /// Answers every request for `term` with `status`.
    #[must_use]
    pub fn failing(self, term: &str, status: u16) -> Self {
        self.faults.lock().insert(
            term.to_string(),
            Fault {
                status,
                remaining: None,
            },
        );
        self
    }

    /// Answers the next `times` requests for `term` with `status`.
    #[must_use]
    pub fn failing_times(self, term: &str, status: u16, times: usize) -> Self {
        self.faults.lock().insert(
            term.to_string(),
            Fault {
                status,
                remaining: Some(times),
            },
        );
        self
    }

    /// Every query sent, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<PageQuery> {
        self.calls.lock().clone()
    }

    /// Number of queries sent.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Page indices requested for `term`, in send order.
    #[must_use]
    pub fn pages_requested(&self, term: &str) -> Vec<u32> {
        self.calls
            .lock()
            .iter()
            .filter(|q| q.param("q") == Some(term))
            .filter_map(|q| q.param("page").and_then(|p| p.parse().ok()))
            .collect()
    }

    fn fault_for(&self, term: &str) -> Option<u16> {
        let mut faults = self.faults.lock();
        let fault = faults.get_mut(term)?;
        match &mut fault.remaining {
            None => Some(fault.status),
            Some(0) => None,
            Some(remaining) => {
                *remaining -= 1;
                Some(fault.status)
            }
        }
    }

    fn respond(&self, term: &str, page: usize) -> RawPage {
        let pages = self.catalog.get(term).map(Vec::as_slice).unwrap_or_default();
        let total: usize = pages.iter().map(Vec::len).sum();
        let items = page
            .checked_sub(1)
            .and_then(|i| pages.get(i))
            .cloned()
            .unwrap_or_default();
        let body = if self.hide_totals {
            json!({ "items": items })
        } else {
            json!({ "total": total, "items": items })
        };
        RawPage::ok(body.to_string())
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, query: &PageQuery) -> Result<RawPage, NetworkError> {
        self.calls.lock().push(query.clone());
        let term = query.param("q").unwrap_or_default().to_string();
        for _ in 0..self.yields.get(&term).copied().unwrap_or(0) {
            tokio::task::yield_now().await;
        }

        if let Some(status) = self.fault_for(&term) {
            return Ok(RawPage::new(status, "").with_url(query.url.clone()));
        }
        let Some(page) = query.param("page").and_then(|p| p.parse::<usize>().ok()) else {
            // Warm-up and other non-search requests.
            return Ok(RawPage::ok("{}").with_url(query.url.clone()));
        };
        Ok(self.respond(&term, page).with_url(query.url.clone()))
    }
}
