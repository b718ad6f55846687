//! New York Times Article Search API.

use crate::adapter::{PageCount, SourceAdapter, SourceIdentity};
use crate::aggregate::{record, PageResult, Record};
use crate::errors::{ParseError, ScraperError, ValidationError};
use crate::params::{DateFormat, SearchRequest};
use crate::ratelimit::RateLimitConfig;
use crate::transport::{PageQuery, RawPage};
use serde::Deserialize;
use serde_json::Value;

const API_URL: &str = "https://api.nytimes.com/svc/search/v2/articlesearch.json";
const SITE: &str = "https://www.nytimes.com/";
const PAGE_SIZE: u32 = 10;
const MAX_RESULTS: u32 = 1000;
const SORTS: [&str; 4] = ["best", "newest", "oldest", "relevance"];

/// Environment variable holding the default API key.
pub const API_KEY_ENV: &str = "NYT_API_KEY";

#[derive(Debug, Deserialize)]
struct Envelope {
    response: Option<SearchResponse>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    docs: Option<Vec<Doc>>,
    meta: Option<Meta>,
    metadata: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    hits: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Doc {
    headline: Option<Headline>,
    web_url: Option<String>,
    pub_date: Option<String>,
    section_name: Option<String>,
    subsection_name: Option<String>,
    type_of_material: Option<String>,
    #[serde(rename = "abstract")]
    summary: Option<String>,
    snippet: Option<String>,
    byline: Option<Byline>,
    multimedia: Value,
}

#[derive(Debug, Default, Deserialize)]
struct Headline {
    main: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Byline {
    original: Option<String>,
}

impl Doc {
    // Older responses list renditions with site-relative URLs; newer ones
    // nest an absolute `default` rendition.
    fn image_url(&self) -> String {
        let url = match &self.multimedia {
            Value::Array(items) => items.first().and_then(|m| m.get("url")),
            Value::Object(_) => self.multimedia.get("default").and_then(|m| m.get("url")),
            _ => None,
        };
        match url.and_then(Value::as_str) {
            Some(url) if url.starts_with("http") => url.to_string(),
            Some(url) => format!("{SITE}{url}"),
            None => String::new(),
        }
    }

    fn into_record(self) -> Record {
        let image = self.image_url();
        let authors = self
            .byline
            .and_then(|b| b.original)
            .map(|by| by.trim().trim_start_matches("By ").to_string())
            .unwrap_or_default();
        record([
            ("titulo", self.headline.and_then(|h| h.main).unwrap_or_default()),
            ("url", self.web_url.unwrap_or_default()),
            ("data_publicacao", self.pub_date.unwrap_or_default()),
            ("secao", self.section_name.unwrap_or_default()),
            ("subsecao", self.subsection_name.unwrap_or_default()),
            ("tipo", self.type_of_material.unwrap_or_default()),
            ("resumo", self.summary.or(self.snippet).unwrap_or_default()),
            ("autores", authors),
            ("imagem_url", image),
        ])
    }
}

/// Adapter for the NYT Article Search API.
///
/// The API is quota-bound (5 requests per minute, 500 per day) and serves
/// at most 1000 results per query. The key comes from the `api_key`
/// filter or from the adapter itself.
///
/// Filters: `api_key`, `fq` (raw filter query), `secao`, `tipo` (both
/// exclusive with `fq`), `ano`, `sort`, `max_resultados`.
#[derive(Debug, Clone)]
pub struct NytAdapter {
    identity: SourceIdentity,
    api_key: Option<String>,
}

impl Default for NytAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl NytAdapter {
    /// Creates the adapter without a default key.
    #[must_use]
    pub fn new() -> Self {
        Self {
            identity: SourceIdentity::api("nyt", API_URL)
                .with_record_type("artigo")
                .with_page_size(PAGE_SIZE)
                .with_max_results(MAX_RESULTS)
                .with_rate_limit(RateLimitConfig::new().with_per_minute(5).with_per_day(500)),
            api_key: None,
        }
    }

    /// Creates the adapter with the key from `NYT_API_KEY`, if set.
    #[must_use]
    pub fn from_env() -> Self {
        let adapter = Self::new();
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => adapter.with_api_key(key.trim()),
            _ => adapter,
        }
    }

    /// Sets the default API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    fn api_key<'a>(&'a self, request: &'a SearchRequest) -> Option<&'a str> {
        request.filter("api_key").or(self.api_key.as_deref())
    }

    fn filter_query(request: &SearchRequest) -> Option<String> {
        if let Some(fq) = request.filter("fq") {
            return Some(fq.to_string());
        }
        let clauses: Vec<String> = [("secao", "section_name"), ("tipo", "type_of_material")]
            .into_iter()
            .filter_map(|(filter, field)| request.filter(filter).map(|v| format!(r#"{field}:("{v}")"#)))
            .collect();
        (!clauses.is_empty()).then(|| clauses.join(" AND "))
    }

    fn max_results(request: &SearchRequest) -> Option<u64> {
        request.filter("max_resultados").and_then(|v| v.parse().ok())
    }
}

impl SourceAdapter for NytAdapter {
    fn identity(&self) -> &SourceIdentity {
        &self.identity
    }

    fn build_query(&self, term: &str, page: u32, request: &SearchRequest) -> PageQuery {
        let dates = request.dates();
        let year = request.filter("ano");
        let begin = dates
            .start()
            .map(|d| DateFormat::Compact.format(d))
            .or_else(|| year.map(|y| format!("{y}0101")));
        let end = dates
            .end()
            .map(|d| DateFormat::Compact.format(d))
            .or_else(|| year.map(|y| format!("{y}1231")));

        let mut query = PageQuery::get(API_URL).with_param("q", term);
        for (key, value) in [
            ("fq", Self::filter_query(request)),
            ("begin_date", begin),
            ("end_date", end),
            ("sort", request.filter("sort").map(str::to_string)),
        ] {
            if let Some(value) = value {
                query = query.with_param(key, value);
            }
        }
        query = query.with_param("page", page.saturating_sub(1).to_string());
        match self.api_key(request) {
            Some(key) => query.with_param("api-key", key),
            None => query,
        }
    }

    fn read_page_count(&self, probe: &RawPage, request: &SearchRequest) -> Result<PageCount, ScraperError> {
        let envelope: Envelope = probe.json()?;
        let hits = envelope
            .response
            .and_then(|r| r.meta.or(r.metadata))
            .and_then(|m| m.hits)
            .ok_or_else(|| ParseError::new("response carries no hit count"))?;
        let hits = Self::max_results(request).map_or(hits, |max| hits.min(max));
        Ok(PageCount::from_results(hits, PAGE_SIZE))
    }

    fn parse_page(&self, raw: &RawPage) -> Result<PageResult, ScraperError> {
        let envelope: Envelope = raw.json()?;
        let docs = envelope
            .response
            .and_then(|r| r.docs)
            .ok_or_else(|| ParseError::new("response carries no `docs` array"))?;
        Ok(docs.into_iter().map(Doc::into_record).collect())
    }

    fn validate_source_params(&self, request: &SearchRequest) -> Result<(), ValidationError> {
        if self.api_key(request).is_none() {
            return Err(ValidationError::missing("api_key"));
        }
        if request.filter("fq").is_some() {
            if let Some(other) = ["secao", "tipo"].into_iter().find(|f| request.filter(f).is_some()) {
                return Err(ValidationError::conflicting("fq", other));
            }
        }
        if let Some(sort) = request.filter("sort") {
            if !SORTS.contains(&sort) {
                return Err(ValidationError::invalid_choice("sort", sort, &SORTS));
            }
        }
        if let Some(year) = request.filter("ano") {
            if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ValidationError::invalid_value("ano", year, "a four-digit year"));
            }
        }
        if let Some(max) = request.filter("max_resultados") {
            if !matches!(max.parse::<u64>(), Ok(n) if n > 0) {
                return Err(ValidationError::invalid_value("max_resultados", max, "a positive integer"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParameterValidator, RawRequest};
    use pretty_assertions::assert_eq;

    const RESPONSE: &str = r#"{
        "status": "OK",
        "response": {
            "docs": [
                {
                    "abstract": "The justices heard arguments on Monday.",
                    "web_url": "https://www.nytimes.com/2024/03/04/us/politics/supreme-court.html",
                    "snippet": "snippet",
                    "headline": {"main": "Supreme Court Weighs Case"},
                    "pub_date": "2024-03-04T10:00:00+0000",
                    "section_name": "U.S.",
                    "subsection_name": null,
                    "type_of_material": "News",
                    "byline": {"original": "By Adam Liptak"},
                    "multimedia": [{"url": "images/2024/03/04/multimedia/court.jpg"}]
                },
                {
                    "headline": {"main": "Opinion | Climate"},
                    "snippet": "A short note.",
                    "multimedia": {"default": {"url": "https://static01.nyt.com/images/climate.jpg"}}
                }
            ],
            "meta": {"hits": 2345, "offset": 0, "time": 12}
        }
    }"#;

    fn validate(raw: RawRequest) -> Result<SearchRequest, ValidationError> {
        ParameterValidator::new().validate(raw, &NytAdapter::new().with_api_key("k"))
    }

    #[test]
    fn test_identity_declares_quota_and_cap() {
        let identity = NytAdapter::new().identity().clone();
        assert_eq!(identity.page_cap(), Some(100));
        assert_eq!(
            identity.rate_limit,
            Some(RateLimitConfig::new().with_per_minute(5).with_per_day(500))
        );
    }

    #[test]
    fn test_query_wire_format() {
        let request = validate(
            RawRequest::new("supreme court")
                .with_dates("2024-01-01", "30/06/2024")
                .with_filter("sort", "newest")
                .with_filter("secao", "U.S."),
        )
        .unwrap();
        let query = NytAdapter::new().with_api_key("k").build_query("supreme court", 1, &request);

        assert_eq!(query.param("q"), Some("supreme court"));
        assert_eq!(query.param("page"), Some("0"));
        assert_eq!(query.param("begin_date"), Some("20240101"));
        assert_eq!(query.param("end_date"), Some("20240630"));
        assert_eq!(query.param("sort"), Some("newest"));
        assert_eq!(query.param("fq"), Some(r#"section_name:("U.S.")"#));
        assert_eq!(query.param("api-key"), Some("k"));
    }

    #[test]
    fn test_year_fills_missing_dates() {
        let request = validate(RawRequest::new("x").with_filter("ano", "2023")).unwrap();
        let query = NytAdapter::new().build_query("x", 5, &request);

        assert_eq!(query.param("begin_date"), Some("20230101"));
        assert_eq!(query.param("end_date"), Some("20231231"));
        assert_eq!(query.param("page"), Some("4"));
    }

    #[test]
    fn test_key_from_filter_wins() {
        let request = ParameterValidator::new()
            .validate(RawRequest::new("x").with_filter("api_key", "mine"), &NytAdapter::new())
            .unwrap();
        let query = NytAdapter::new().with_api_key("default").build_query("x", 1, &request);
        assert_eq!(query.param("api-key"), Some("mine"));
    }

    #[test]
    fn test_validation_rules() {
        let missing_key = ParameterValidator::new().validate(RawRequest::new("x"), &NytAdapter::new());
        assert_eq!(missing_key.unwrap_err(), ValidationError::missing("api_key"));

        let conflict = validate(
            RawRequest::new("x")
                .with_filter("fq", r#"news_desk:("Sports")"#)
                .with_filter("tipo", "News"),
        );
        assert_eq!(conflict.unwrap_err(), ValidationError::conflicting("fq", "tipo"));

        let sort = validate(RawRequest::new("x").with_filter("sort", "random"));
        assert!(matches!(sort, Err(ValidationError::InvalidChoice { .. })));

        let max = validate(RawRequest::new("x").with_filter("max_resultados", "muitos"));
        assert!(matches!(max, Err(ValidationError::InvalidValue { ref field, .. }) if field == "max_resultados"));

        let year = validate(RawRequest::new("x").with_filter("ano", "24"));
        assert!(matches!(year, Err(ValidationError::InvalidValue { .. })));
    }

    #[test]
    fn test_count_honours_max_results() {
        let adapter = NytAdapter::new();
        let plain = validate(RawRequest::new("x")).unwrap();
        let capped = validate(RawRequest::new("x").with_filter("max_resultados", "25")).unwrap();

        assert_eq!(
            adapter.read_page_count(&RawPage::ok(RESPONSE), &plain).unwrap(),
            PageCount::Exact(235)
        );
        assert_eq!(
            adapter.read_page_count(&RawPage::ok(RESPONSE), &capped).unwrap(),
            PageCount::Exact(3)
        );
        let newer = r#"{"response": {"docs": [], "metadata": {"hits": 7}}}"#;
        assert_eq!(
            adapter.read_page_count(&RawPage::ok(newer), &plain).unwrap(),
            PageCount::Exact(1)
        );
    }

    #[test]
    fn test_parses_docs() {
        let page = NytAdapter::new().parse_page(&RawPage::ok(RESPONSE)).unwrap();

        assert_eq!(page.len(), 2);
        let first = &page.records()[0];
        assert_eq!(first["titulo"], "Supreme Court Weighs Case");
        assert_eq!(first["autores"], "Adam Liptak");
        assert_eq!(first["subsecao"], "");
        assert_eq!(first["resumo"], "The justices heard arguments on Monday.");
        assert_eq!(
            first["imagem_url"],
            "https://www.nytimes.com/images/2024/03/04/multimedia/court.jpg"
        );
        let second = &page.records()[1];
        assert_eq!(second["resumo"], "A short note.");
        assert_eq!(second["imagem_url"], "https://static01.nyt.com/images/climate.jpg");
    }

    #[test]
    fn test_fault_body_is_parse_error() {
        let err = NytAdapter::new()
            .parse_page(&RawPage::ok(r#"{"fault": {"faultstring": "Invalid ApiKey"}}"#))
            .unwrap_err();
        assert_eq!(err.kind(), "ParseError");
    }
}
