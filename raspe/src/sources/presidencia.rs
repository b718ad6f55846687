//! Presidência da República: federal legislation search.

use crate::adapter::html::{missing_listing, parse_count, selector, text_of};
use crate::adapter::{PageCount, SourceAdapter, SourceIdentity};
use crate::aggregate::{record, PageResult};
use crate::errors::ScraperError;
use crate::params::SearchRequest;
use crate::transport::{HttpMethod, PageQuery, RawPage};
use regex::Regex;
use scraper::Html;
use std::sync::LazyLock;
use tracing::debug;

const SEARCH_URL: &str = "https://legislacao.presidencia.gov.br/pesquisa/ajax/resultado_pesquisa_legislacao.php";
const PAGE_SIZE: u32 = 10;

static RESULTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([\d.]+)\s+resultados?\s+encontrados?").expect("Invalid result count regex")
});

/// Adapter for the Presidência legislation search.
///
/// The endpoint is an AJAX form: POST with an offset (`posicao`) rather
/// than a page number.
#[derive(Debug, Clone)]
pub struct PresidenciaAdapter {
    identity: SourceIdentity,
}

impl Default for PresidenciaAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PresidenciaAdapter {
    /// Creates the adapter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            identity: SourceIdentity::html("presidencia", SEARCH_URL)
                .with_method(HttpMethod::Post)
                .with_record_type("norma")
                .with_page_size(PAGE_SIZE),
        }
    }
}

impl SourceAdapter for PresidenciaAdapter {
    fn identity(&self) -> &SourceIdentity {
        &self.identity
    }

    fn build_query(&self, term: &str, page: u32, _request: &SearchRequest) -> PageQuery {
        let offset = page.saturating_sub(1) * PAGE_SIZE;
        PageQuery::post(SEARCH_URL)
            .with_param("termo", term)
            .with_param("ordenacao", "maior_data")
            .with_param("posicao", offset.to_string())
            .with_headers(&[
                ("Accept", "*/*"),
                ("Origin", "https://legislacao.presidencia.gov.br"),
                ("Referer", "https://legislacao.presidencia.gov.br/"),
                ("X-Requested-With", "XMLHttpRequest"),
            ])
    }

    fn read_page_count(&self, probe: &RawPage, _request: &SearchRequest) -> Result<PageCount, ScraperError> {
        let document = Html::parse_document(&probe.body);
        let h4 = selector("h4")?;
        let text = document.select(&h4).next().map(|e| text_of(&e)).unwrap_or_default();

        let results = RESULTS
            .captures(&text)
            .and_then(|c| c[1].replace('.', "").parse().ok())
            .or_else(|| parse_count(&text))
            .unwrap_or(0);
        debug!(results, "presidencia result count");
        Ok(PageCount::from_results(results, PAGE_SIZE))
    }

    fn parse_page(&self, raw: &RawPage) -> Result<PageResult, ScraperError> {
        let document = Html::parse_document(&raw.body);
        let card = selector("div.card-body.p-0")?;
        let div = selector("div")?;
        let a = selector("a")?;
        let p = selector("p")?;

        let Some(card) = document.select(&card).next() else {
            return missing_listing(&document, &["nenhum resultado", "0 resultados"], "result card");
        };
        let Some(container) = card.select(&div).next() else {
            return Ok(PageResult::empty());
        };

        // Entries alternate with spacer divs.
        let rows = container
            .select(&div)
            .step_by(2)
            .filter_map(|item| {
                let links: Vec<_> = item.select(&a).collect();
                let paragraphs: Vec<_> = item.select(&p).collect();
                if links.len() < 2 || paragraphs.len() < 2 {
                    debug!("skipping incomplete presidencia entry");
                    return None;
                }
                let href = |i: usize| links[i].value().attr("href").unwrap_or_default().trim().to_string();
                Some(record([
                    ("nome", text_of(&links[0])),
                    ("link", href(0)),
                    ("ficha", href(1)),
                    ("revogacao", text_of(&paragraphs[0])),
                    ("descricao", text_of(&paragraphs[1])),
                ]))
            })
            .collect();
        Ok(rows)
    }
}
