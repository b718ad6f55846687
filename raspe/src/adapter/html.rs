//! Helpers shared by the HTML adapters.

use crate::aggregate::PageResult;
use crate::errors::{ParseError, ScraperError};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,3}(?:\.\d{3})+|\d+").expect("Invalid result count regex"));

/// Compiles a CSS selector, reporting failures as parse errors.
pub fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::new(format!("invalid selector `{css}`: {e}")))
}

/// Text content with whitespace runs collapsed.
#[must_use]
pub fn text_of(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of the first match under `scope`, or an empty string.
#[must_use]
pub fn first_text(scope: &ElementRef<'_>, selector: &Selector) -> String {
    scope.select(selector).next().map(|e| text_of(&e)).unwrap_or_default()
}

/// Attribute of the first match under `scope`.
#[must_use]
pub fn first_attr(scope: &ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    scope
        .select(selector)
        .next()
        .and_then(|e| e.value().attr(attr))
        .map(|v| v.trim().to_string())
}

/// Direct element children of `element`.
pub fn child_elements<'a>(element: &ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.children().filter_map(ElementRef::wrap)
}

/// First integer in `text`, accepting `.` as a thousands separator
/// ("1.006 resultados" is 1006).
#[must_use]
pub fn parse_count(text: &str) -> Option<u64> {
    COUNT
        .find(text)
        .and_then(|m| m.as_str().replace('.', "").parse().ok())
}

/// Returns true if the page text contains any of `markers`, ignoring case.
#[must_use]
pub fn has_marker(document: &Html, markers: &[&str]) -> bool {
    let text = document.root_element().text().collect::<String>().to_lowercase();
    markers.iter().any(|m| text.contains(&m.to_lowercase()))
}

/// Result for a page whose listing container is absent: empty if the
/// source says there are no results, a parse error otherwise.
pub fn missing_listing(document: &Html, markers: &[&str], what: &str) -> Result<PageResult, ScraperError> {
    if has_marker(document, markers) {
        Ok(PageResult::empty())
    } else {
        Err(ParseError::new(format!("{what} not found in response")).into())
    }
}
