//! Caller-facing request and its canonical, validated form.

use super::dates::DateRange;
use crate::errors::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Range, RangeFrom, RangeInclusive};

/// One or more search terms, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchTerms {
    /// A bare term.
    One(String),
    /// An ordered list of terms.
    Many(Vec<String>),
}

impl SearchTerms {
    /// Normalizes into an ordered list.
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(term) => vec![term],
            Self::Many(terms) => terms,
        }
    }
}

impl From<&str> for SearchTerms {
    fn from(term: &str) -> Self {
        Self::One(term.to_string())
    }
}

impl From<String> for SearchTerms {
    fn from(term: String) -> Self {
        Self::One(term)
    }
}

impl From<Vec<String>> for SearchTerms {
    fn from(terms: Vec<String>) -> Self {
        Self::Many(terms)
    }
}

impl From<Vec<&str>> for SearchTerms {
    fn from(terms: Vec<&str>) -> Self {
        Self::Many(terms.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for SearchTerms {
    fn from(terms: [&str; N]) -> Self {
        Self::Many(terms.iter().map(ToString::to_string).collect())
    }
}

/// An inclusive range of 1-based page indices; `end: None` means "through
/// the last discovered page".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    start: u32,
    end: Option<u32>,
}

impl PageRange {
    /// Creates a bounded range.
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// Creates a range from `start` through the last page.
    #[must_use]
    pub const fn starting_at(start: u32) -> Self {
        Self { start, end: None }
    }

    /// First requested page.
    #[must_use]
    pub const fn start(&self) -> u32 {
        self.start
    }

    /// Last requested page, if bounded.
    #[must_use]
    pub const fn end(&self) -> Option<u32> {
        self.end
    }

    /// Returns true if `page` falls inside the range.
    #[must_use]
    pub fn contains(&self, page: u32) -> bool {
        page >= self.start && self.end.map_or(true, |end| page <= end)
    }

    fn validate(self) -> Result<Self, ValidationError> {
        let end = self.end.unwrap_or(self.start);
        if self.start == 0 || end < self.start {
            return Err(ValidationError::InvalidPageRange {
                start: self.start,
                end,
            });
        }
        Ok(self)
    }
}

impl From<RangeInclusive<u32>> for PageRange {
    fn from(range: RangeInclusive<u32>) -> Self {
        Self::new(*range.start(), *range.end())
    }
}

impl From<Range<u32>> for PageRange {
    fn from(range: Range<u32>) -> Self {
        Self::new(range.start, range.end.saturating_sub(1))
    }
}

impl From<RangeFrom<u32>> for PageRange {
    fn from(range: RangeFrom<u32>) -> Self {
        Self::starting_at(range.start)
    }
}

/// Source-specific filters (content type, year, API key, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filters(BTreeMap<String, String>);

impl Filters {
    /// Creates an empty filter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a filter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the trimmed value of a filter, treating blank values as unset.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
    }

    /// Returns the filter value or `default`.
    #[must_use]
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Returns true if a non-blank value is set.
    #[must_use]
    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterates over all filters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of filters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no filters are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Filters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A search request as supplied by the caller, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRequest {
    /// Terms to search for.
    pub terms: SearchTerms,
    /// Requested pages; all discovered pages when absent.
    #[serde(default)]
    pub pages: Option<PageRange>,
    /// Start date in any accepted notation.
    #[serde(default)]
    pub data_inicio: Option<String>,
    /// End date in any accepted notation.
    #[serde(default)]
    pub data_fim: Option<String>,
    /// Source-specific filters.
    #[serde(default)]
    pub filters: Filters,
}

impl RawRequest {
    /// Creates a request for one or more terms.
    #[must_use]
    pub fn new(terms: impl Into<SearchTerms>) -> Self {
        Self {
            terms: terms.into(),
            pages: None,
            data_inicio: None,
            data_fim: None,
            filters: Filters::new(),
        }
    }

    /// Restricts the request to a page range.
    #[must_use]
    pub fn with_pages(mut self, pages: impl Into<PageRange>) -> Self {
        self.pages = Some(pages.into());
        self
    }

    /// Sets both date bounds.
    #[must_use]
    pub fn with_dates(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.data_inicio = Some(start.into());
        self.data_fim = Some(end.into());
        self
    }

    /// Sets the start date.
    #[must_use]
    pub fn with_start_date(mut self, start: impl Into<String>) -> Self {
        self.data_inicio = Some(start.into());
        self
    }

    /// Sets the end date.
    #[must_use]
    pub fn with_end_date(mut self, end: impl Into<String>) -> Self {
        self.data_fim = Some(end.into());
        self
    }

    /// Adds a source-specific filter.
    #[must_use]
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key, value);
        self
    }
}

/// A validated request: non-empty terms, sane page range, ordered dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRequest {
    terms: Vec<String>,
    pages: Option<PageRange>,
    dates: DateRange,
    filters: Filters,
}

impl SearchRequest {
    pub(crate) fn from_raw(raw: RawRequest) -> Result<Self, ValidationError> {
        let terms = raw.terms.into_vec();
        if terms.is_empty() {
            return Err(ValidationError::EmptySearchTerms);
        }
        let terms = terms
            .into_iter()
            .enumerate()
            .map(|(index, term)| {
                let trimmed = term.trim();
                if trimmed.is_empty() {
                    Err(ValidationError::BlankSearchTerm { index })
                } else {
                    Ok(trimmed.to_string())
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let pages = raw.pages.map(PageRange::validate).transpose()?;
        let dates = DateRange::parse(
            raw.data_inicio.as_deref(),
            raw.data_fim.as_deref(),
            "data_inicio",
            "data_fim",
        )?;

        Ok(Self {
            terms,
            pages,
            dates,
            filters: raw.filters,
        })
    }

    /// Ordered search terms.
    #[must_use]
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Requested page range.
    #[must_use]
    pub const fn pages(&self) -> Option<PageRange> {
        self.pages
    }

    /// Canonical date range.
    #[must_use]
    pub const fn dates(&self) -> &DateRange {
        &self.dates
    }

    /// Source-specific filters.
    #[must_use]
    pub const fn filters(&self) -> &Filters {
        &self.filters
    }

    /// Shorthand for `filters().get(key)`.
    #[must_use]
    pub fn filter(&self, key: &str) -> Option<&str> {
        self.filters.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_term_becomes_single_element() {
        let request = SearchRequest::from_raw(RawRequest::new("  educação ")).unwrap();
        assert_eq!(request.terms(), ["educação"]);
    }

    #[test]
    fn test_term_order_preserved() {
        let request = SearchRequest::from_raw(RawRequest::new(["b", "a", "c"])).unwrap();
        assert_eq!(request.terms(), ["b", "a", "c"]);
    }

    #[test]
    fn test_empty_and_blank_terms_rejected() {
        let empty = SearchRequest::from_raw(RawRequest::new(Vec::<String>::new()));
        assert_eq!(empty.unwrap_err(), ValidationError::EmptySearchTerms);

        let blank = SearchRequest::from_raw(RawRequest::new(["saúde", " "]));
        assert_eq!(blank.unwrap_err(), ValidationError::BlankSearchTerm { index: 1 });
    }

    #[test]
    fn test_page_range_conversions() {
        assert_eq!(PageRange::from(1..=3), PageRange::new(1, 3));
        assert_eq!(PageRange::from(1..4), PageRange::new(1, 3));
        assert_eq!(PageRange::from(2..), PageRange::starting_at(2));
        assert!(PageRange::from(2..).contains(500));
        assert!(!PageRange::new(2, 3).contains(1));
    }

    #[test]
    fn test_invalid_page_ranges_rejected() {
        for pages in [PageRange::new(0, 3), PageRange::new(5, 4), PageRange::from(3..3)] {
            let result = SearchRequest::from_raw(RawRequest::new("x").with_pages(pages));
            assert!(matches!(result, Err(ValidationError::InvalidPageRange { .. })));
        }
    }

    #[test]
    fn test_blank_filters_are_unset() {
        let filters: Filters = [("ano", " "), ("uf", "SP")].into_iter().collect();
        assert!(!filters.is_set("ano"));
        assert_eq!(filters.get("uf"), Some("SP"));
        assert_eq!(filters.get_or("revogada", "todas"), "todas");
    }

    #[test]
    fn test_raw_request_deserializes() {
        let raw: RawRequest = serde_json::from_str(
            r#"{"terms": "saúde", "pages": {"start": 1, "end": 2}, "filters": {"ano": "2024"}}"#,
        )
        .unwrap();
        assert_eq!(raw.terms, SearchTerms::One("saúde".to_string()));
        assert_eq!(raw.pages, Some(PageRange::new(1, 2)));
        assert_eq!(raw.filters.get("ano"), Some("2024"));
    }
}
