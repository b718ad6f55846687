//! Merging per-term, per-page results into one tagged table.

use crate::engine::TermFailure;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// One row: field name to value, in column order.
pub type Record = serde_json::Map<String, Value>;

/// Column holding the search term that produced a row.
pub const TERM_COLUMN: &str = "termo_busca";

/// Builds a record from string fields, keeping their order.
#[must_use]
pub fn record<const N: usize>(fields: [(&str, String); N]) -> Record {
    fields
        .into_iter()
        .map(|(k, v)| (k.to_string(), Value::String(v)))
        .collect()
}

/// Records parsed from one page, in page order. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageResult {
    records: Vec<Record>,
}

impl PageResult {
    /// Wraps parsed records.
    #[must_use]
    pub const fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// A page without records.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Appends a record.
    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the page had no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The records.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Consumes the page, yielding its records.
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

impl FromIterator<Record> for PageResult {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// All pages collected for one term, keyed by page index.
///
/// Pages may arrive in any completion order; they are read back in index
/// order.
#[derive(Debug, Clone, Default)]
pub struct TermBatch {
    term: String,
    pages: BTreeMap<u32, PageResult>,
}

impl TermBatch {
    /// Creates an empty batch for `term`.
    #[must_use]
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            pages: BTreeMap::new(),
        }
    }

    /// Stores the result for a page.
    pub fn insert(&mut self, page: u32, result: PageResult) {
        self.pages.insert(page, result);
    }

    /// The term.
    #[must_use]
    pub fn term(&self) -> &str {
        &self.term
    }

    /// Page indices collected, ascending.
    pub fn page_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.pages.keys().copied()
    }

    /// Total records across pages.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.pages.values().map(PageResult::len).sum()
    }

    /// Rows in page-then-in-page order, each tagged with the term.
    #[must_use]
    pub fn into_tagged_rows(self) -> Vec<Record> {
        let term = self.term;
        self.pages
            .into_values()
            .flat_map(PageResult::into_records)
            .map(|row| tag(row, &term))
            .collect()
    }
}

// The tag always ends up as the last column.
fn tag(row: Record, term: &str) -> Record {
    let mut tagged: Record = row.into_iter().filter(|(k, _)| k != TERM_COLUMN).collect();
    tagged.insert(TERM_COLUMN.to_string(), Value::String(term.to_string()));
    tagged
}

/// Collects term batches and produces the final table.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    batches: BTreeMap<usize, TermBatch>,
    failures: Vec<TermFailure>,
}

impl ResultAggregator {
    /// Creates an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the batch for the term at `index` in the request.
    pub fn add(&mut self, index: usize, batch: TermBatch) {
        self.batches.insert(index, batch);
    }

    /// Records a term that failed under the skip-failed-terms policy.
    pub fn add_failure(&mut self, failure: TermFailure) {
        self.failures.push(failure);
    }

    /// Concatenates batches in term order.
    #[must_use]
    pub fn finish(self) -> AggregatedResult {
        let rows = self
            .batches
            .into_values()
            .flat_map(TermBatch::into_tagged_rows)
            .collect();
        let mut failures = self.failures;
        failures.sort_by_key(|f| f.index);
        AggregatedResult { rows, failures }
    }
}

/// The merged result of a scrape.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregatedResult {
    rows: Vec<Record>,
    failures: Vec<TermFailure>,
}

impl AggregatedResult {
    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The rows in term, page, in-page order.
    #[must_use]
    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    /// Iterates over rows.
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.rows.iter()
    }

    /// Consumes the result, yielding its rows.
    #[must_use]
    pub fn into_rows(self) -> Vec<Record> {
        self.rows
    }

    /// Rows produced by `term`.
    pub fn rows_for_term<'a>(&'a self, term: &'a str) -> impl Iterator<Item = &'a Record> + 'a {
        self.rows
            .iter()
            .filter(move |row| row.get(TERM_COLUMN).and_then(Value::as_str) == Some(term))
    }

    /// Union of field names in first-seen order.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .flat_map(|row| row.keys())
            .filter(|k| seen.insert(k.as_str()))
            .cloned()
            .collect()
    }

    /// Terms skipped under [`crate::engine::FailurePolicy::SkipFailedTerms`].
    #[must_use]
    pub fn failures(&self) -> &[TermFailure] {
        &self.failures
    }

    /// Returns true if every term completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl<'a> IntoIterator for &'a AggregatedResult {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn page(ids: &[&str]) -> PageResult {
        ids.iter().map(|id| record([("id", (*id).to_string())])).collect()
    }

    fn ids(result: &AggregatedResult) -> Vec<&str> {
        result.iter().filter_map(|r| r.get("id").and_then(Value::as_str)).collect()
    }

    #[test]
    fn test_pages_ordered_by_index_not_arrival() {
        let mut batch = TermBatch::new("saúde");
        batch.insert(3, page(&["c1"]));
        batch.insert(1, page(&["a1", "a2"]));
        batch.insert(2, page(&["b1"]));

        let mut aggregator = ResultAggregator::new();
        aggregator.add(0, batch);
        let result = aggregator.finish();

        assert_eq!(ids(&result), vec!["a1", "a2", "b1", "c1"]);
    }

    #[test]
    fn test_terms_concatenated_in_request_order() {
        let mut first = TermBatch::new("x");
        first.insert(1, page(&["x1"]));
        let mut second = TermBatch::new("y");
        second.insert(1, page(&["y1", "y2"]));

        let mut aggregator = ResultAggregator::new();
        aggregator.add(1, second);
        aggregator.add(0, first);
        let result = aggregator.finish();

        assert_eq!(ids(&result), vec!["x1", "y1", "y2"]);
        assert_eq!(result.rows_for_term("y").count(), 2);
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_tag_overwrites_and_is_last_column() {
        let mut row = Record::new();
        row.insert(TERM_COLUMN.to_string(), json!("stale"));
        row.insert("titulo".to_string(), json!("Lei 1"));
        row.insert("link".to_string(), json!("https://example.org/1"));
        let mut batch = TermBatch::new("fresh");
        batch.insert(1, PageResult::new(vec![row]));

        let rows = batch.into_tagged_rows();

        assert_eq!(
            rows[0].keys().collect::<Vec<_>>(),
            vec!["titulo", "link", TERM_COLUMN]
        );
        assert_eq!(rows[0][TERM_COLUMN], json!("fresh"));
    }

    #[test]
    fn test_columns_first_seen_union() {
        let mut batch = TermBatch::new("t");
        batch.insert(
            1,
            PageResult::new(vec![
                record([("a", "1".into()), ("b", "2".into())]),
                record([("c", "3".into()), ("a", "4".into())]),
            ]),
        );
        let mut aggregator = ResultAggregator::new();
        aggregator.add(0, batch);

        assert_eq!(aggregator.finish().columns(), vec!["a", "b", TERM_COLUMN, "c"]);
    }

    #[test]
    fn test_empty_batches_contribute_nothing() {
        let mut batch = TermBatch::new("nada");
        batch.insert(1, PageResult::empty());
        let mut aggregator = ResultAggregator::new();
        aggregator.add(0, batch);

        let result = aggregator.finish();
        assert!(result.is_empty());
        assert!(result.is_complete());
    }
}
