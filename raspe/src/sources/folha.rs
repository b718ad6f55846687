//! Folha de S.Paulo: news search.

use crate::adapter::html::{first_attr, first_text, missing_listing, parse_count, selector, text_of};
use crate::adapter::{PageCount, SourceAdapter, SourceIdentity};
use crate::aggregate::{record, PageResult};
use crate::errors::{ScraperError, ValidationError};
use crate::params::{DateFormat, SearchRequest};
use crate::transport::{PageQuery, RawPage};
use regex::Regex;
use scraper::Html;
use std::sync::LazyLock;

const SEARCH_URL: &str = "https://search.folha.uol.com.br/search";
const PAGE_SIZE: u32 = 25;
const SITES: [&str; 3] = ["todos", "online", "jornal"];

static RESULTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d[\d.]*)\s+resultado").expect("Invalid result count regex"));

/// Adapter for the Folha news search.
///
/// Pages are addressed by the 1-based rank of their first row (`sr`).
/// Filters: `site` (`todos`, `online`, `jornal`).
#[derive(Debug, Clone)]
pub struct FolhaAdapter {
    identity: SourceIdentity,
}

impl Default for FolhaAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl FolhaAdapter {
    /// Creates the adapter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            identity: SourceIdentity::html("folha", SEARCH_URL)
                .with_record_type("noticia")
                .with_page_size(PAGE_SIZE),
        }
    }
}

impl SourceAdapter for FolhaAdapter {
    fn identity(&self) -> &SourceIdentity {
        &self.identity
    }

    fn build_query(&self, term: &str, page: u32, request: &SearchRequest) -> PageQuery {
        let dates = request.dates();
        let first_row = page.saturating_sub(1) * PAGE_SIZE + 1;
        let mut query = PageQuery::get(SEARCH_URL)
            .with_param("q", term)
            .with_param("site", request.filters().get_or("site", "todos"))
            .with_param("periodo", if dates.is_empty() { "todos" } else { "personalizado" });
        if let Some(start) = dates.start() {
            query = query.with_param("sd", DateFormat::Brazilian.format(start));
        }
        if let Some(end) = dates.end() {
            query = query.with_param("ed", DateFormat::Brazilian.format(end));
        }
        query.with_param("sr", first_row.to_string())
    }

    fn read_page_count(&self, probe: &RawPage, _request: &SearchRequest) -> Result<PageCount, ScraperError> {
        let document = Html::parse_document(&probe.body);
        let banner = selector(r#"div[class*="c-search__result"]"#)?;

        let results = match document.select(&banner).next() {
            Some(div) => parse_count(&text_of(&div)),
            None => {
                let text = document.root_element().text().collect::<String>();
                RESULTS
                    .captures(&text)
                    .and_then(|c| c[1].replace('.', "").parse().ok())
            }
        };
        Ok(PageCount::from_results(results.unwrap_or(0), PAGE_SIZE))
    }

    fn parse_page(&self, raw: &RawPage) -> Result<PageResult, ScraperError> {
        let document = Html::parse_document(&raw.body);
        let list = selector("ol.u-list-unstyled.c-search")?;
        let li = selector("li")?;
        let a = selector("a")?;
        let h2 = selector("h2")?;
        let p = selector("p")?;
        let time = selector("time")?;

        let Some(list) = document.select(&list).next() else {
            return missing_listing(&document, &["nenhum resultado", "não encontr"], "news list");
        };
        let or_na = |value: String| if value.is_empty() { "N/A".to_string() } else { value };
        Ok(list
            .select(&li)
            .map(|item| {
                record([
                    ("link", first_attr(&item, &a, "href").unwrap_or_else(|| "N/A".to_string())),
                    ("titulo", or_na(first_text(&item, &h2))),
                    ("resumo", or_na(first_text(&item, &p))),
                    ("data", or_na(first_text(&item, &time))),
                ])
            })
            .collect())
    }

    fn validate_source_params(&self, request: &SearchRequest) -> Result<(), ValidationError> {
        match request.filter("site") {
            Some(site) if !SITES.contains(&site) => Err(ValidationError::invalid_choice("site", site, &SITES)),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParameterValidator, RawRequest};
    use pretty_assertions::assert_eq;

    const LISTING: &str = r#"
        <div class="c-search__result">1.386 resultados</div>
        <ol class="u-list-unstyled c-search">
          <li>
            <a href="https://www1.folha.uol.com.br/educacao/2024/03/exemplo.shtml">
              <h2>Governo anuncia novo programa para o ensino médio</h2>
            </a>
            <p>Medida prevê bolsas para estudantes de baixa renda.</p>
            <time datetime="2024-03-12">12.mar.2024 às 10h00</time>
          </li>
          <li><h2>Sem link</h2></li>
        </ol>"#;

    fn validate(raw: RawRequest) -> Result<SearchRequest, ValidationError> {
        ParameterValidator::new().validate(raw, &FolhaAdapter::new())
    }

    #[test]
    fn test_rank_based_pagination_and_dates() {
        let request = validate(RawRequest::new("educação").with_dates("2024-01-01", "2024-12-31")).unwrap();
        let query = FolhaAdapter::new().build_query("educação", 3, &request);

        assert_eq!(query.param("sr"), Some("51"));
        assert_eq!(query.param("site"), Some("todos"));
        assert_eq!(query.param("periodo"), Some("personalizado"));
        assert_eq!(query.param("sd"), Some("01/01/2024"));
        assert_eq!(query.param("ed"), Some("31/12/2024"));
    }

    #[test]
    fn test_undated_query_searches_all_periods() {
        let request = validate(RawRequest::new("x").with_filter("site", "jornal")).unwrap();
        let query = FolhaAdapter::new().build_query("x", 1, &request);

        assert_eq!(query.param("sr"), Some("1"));
        assert_eq!(query.param("site"), Some("jornal"));
        assert_eq!(query.param("periodo"), Some("todos"));
        assert_eq!(query.param("sd"), None);
    }

    #[test]
    fn test_invalid_site_rejected() {
        let err = validate(RawRequest::new("x").with_filter("site", "blog")).unwrap_err();
        assert_eq!(err, ValidationError::invalid_choice("site", "blog", &SITES));
    }

    #[test]
    fn test_count_uses_25_row_pages() {
        let request = validate(RawRequest::new("x")).unwrap();
        let adapter = FolhaAdapter::new();

        assert_eq!(
            adapter.read_page_count(&RawPage::ok(LISTING), &request).unwrap(),
            PageCount::Exact(56)
        );
        assert_eq!(
            adapter
                .read_page_count(&RawPage::ok("<span>26 resultados</span>"), &request)
                .unwrap(),
            PageCount::Exact(2)
        );
    }

    #[test]
    fn test_parses_news_items() {
        let page = FolhaAdapter::new().parse_page(&RawPage::ok(LISTING)).unwrap();

        assert_eq!(page.len(), 2);
        let first = &page.records()[0];
        assert_eq!(first["titulo"], "Governo anuncia novo programa para o ensino médio");
        assert_eq!(first["data"], "12.mar.2024 às 10h00");
        assert_eq!(page.records()[1]["link"], "N/A");
        assert_eq!(page.records()[1]["resumo"], "N/A");
    }
}
