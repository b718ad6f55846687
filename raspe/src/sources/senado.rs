//! Senado Federal: federal legislation collection of the Senate search.

use crate::adapter::html::{missing_listing, parse_count, selector, text_of};
use crate::adapter::{PageCount, SourceAdapter, SourceIdentity};
use crate::aggregate::{record, PageResult};
use crate::errors::ScraperError;
use crate::params::SearchRequest;
use crate::transport::{PageQuery, RawPage};
use scraper::Html;
use tracing::{debug, warn};

const SEARCH_URL: &str = "https://www6g.senado.leg.br/busca";
const COLLECTION: &str = "Legislação Federal";

/// Adapter for the Senado search, restricted to federal legislation.
///
/// Filters: `tipo_materia`, `ano`.
#[derive(Debug, Clone)]
pub struct SenadoAdapter {
    identity: SourceIdentity,
}

impl Default for SenadoAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SenadoAdapter {
    /// Creates the adapter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            identity: SourceIdentity::html("senado", SEARCH_URL).with_record_type("norma"),
        }
    }
}

impl SourceAdapter for SenadoAdapter {
    fn identity(&self) -> &SourceIdentity {
        &self.identity
    }

    fn build_query(&self, term: &str, page: u32, request: &SearchRequest) -> PageQuery {
        let mut query = PageQuery::get(SEARCH_URL)
            .with_param("colecao", COLLECTION)
            .with_param("p", page.to_string());
        if let Some(tipo) = request.filter("tipo_materia") {
            query = query.with_param("tipo-materia", tipo);
        }
        if let Some(ano) = request.filter("ano") {
            query = query.with_param("ano", ano);
        }
        query.with_param("q", term)
    }

    fn read_page_count(&self, probe: &RawPage, _request: &SearchRequest) -> Result<PageCount, ScraperError> {
        let document = Html::parse_document(&probe.body);
        let facet = selector(&format!(r#"a[data-click-type="dynnav.colecao.{COLLECTION}"]"#))?;

        // Without the collection facet the total is unknown.
        let Some(results) = document.select(&facet).next().and_then(|a| parse_count(&text_of(&a))) else {
            debug!("senado collection facet not found");
            return Ok(PageCount::Unbounded);
        };
        Ok(PageCount::from_results(results, self.identity.page_size))
    }

    fn parse_page(&self, raw: &RawPage) -> Result<PageResult, ScraperError> {
        let document = Html::parse_document(&raw.body);
        let listing = selector("div.sf-busca-resultados")?;
        let item = selector("div.sf-busca-resultados-item")?;
        let h3 = selector("h3")?;
        let a = selector("a")?;
        let p = selector("p")?;

        let Some(listing) = document.select(&listing).next() else {
            return missing_listing(&document, &["nenhum resultado", "não encontr"], "result listing");
        };

        let mut page = PageResult::empty();
        for (index, entry) in listing.select(&item).enumerate() {
            let links: Vec<_> = entry
                .select(&h3)
                .next()
                .map(|heading| heading.select(&a).collect())
                .unwrap_or_default();
            let paragraphs: Vec<String> = entry.select(&p).map(|e| text_of(&e)).collect();
            if links.is_empty() || paragraphs.len() < 3 {
                warn!(
                    index,
                    links = links.len(),
                    paragraphs = paragraphs.len(),
                    "skipping malformed senado entry"
                );
                continue;
            }

            let href = |i: usize| {
                links
                    .get(i)
                    .and_then(|l| l.value().attr("href"))
                    .map_or_else(|| "NA".to_string(), |h| h.trim().to_string())
            };
            // Newer markup puts the collection name in the first paragraph.
            let descricao = if paragraphs[0] == "Legislação" {
                paragraphs[1].clone()
            } else {
                paragraphs[0].clone()
            };
            page.push(record([
                ("titulo", text_of(&links[0])),
                ("link_norma", href(0)),
                ("link_detalhes", href(1)),
                ("descricao", descricao),
                ("trecho_descricao", paragraphs[2].clone()),
            ]));
        }
        debug!(records = page.len(), "senado page parsed");
        Ok(page)
    }
}
