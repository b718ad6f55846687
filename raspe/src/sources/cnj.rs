//! CNJ Comunica: court communications published through the PJe API.

use crate::adapter::{PageCount, SourceAdapter, SourceIdentity};
use crate::aggregate::PageResult;
use crate::errors::{ParseError, ScraperError};
use crate::params::{DateFormat, SearchRequest};
use crate::transport::{PageQuery, RawPage};
use serde::Deserialize;
use serde_json::Value;

const API_URL: &str = "https://comunicaapi.pje.jus.br/api/v1/comunicacao";
const PAGE_SIZE: u32 = 5;

#[derive(Debug, Deserialize)]
struct CountBody {
    count: Option<u64>,
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ItemsBody {
    itens: Option<Vec<Value>>,
}

/// Adapter for the CNJ communications API.
///
/// Dates filter on the availability date.
#[derive(Debug, Clone)]
pub struct CnjAdapter {
    identity: SourceIdentity,
}

impl Default for CnjAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl CnjAdapter {
    /// Creates the adapter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            identity: SourceIdentity::api("cnj", API_URL)
                .with_record_type("comunicacao")
                .with_page_size(PAGE_SIZE),
        }
    }
}

impl SourceAdapter for CnjAdapter {
    fn identity(&self) -> &SourceIdentity {
        &self.identity
    }

    fn build_query(&self, term: &str, page: u32, request: &SearchRequest) -> PageQuery {
        let mut query = PageQuery::get(API_URL)
            .with_param("itensPorPagina", PAGE_SIZE.to_string())
            .with_param("texto", term);
        if let Some(start) = request.dates().start() {
            query = query.with_param("dataDisponibilizacaoInicio", DateFormat::Iso.format(start));
        }
        if let Some(end) = request.dates().end() {
            query = query.with_param("dataDisponibilizacaoFim", DateFormat::Iso.format(end));
        }
        query.with_param("pagina", page.to_string()).with_headers(&[
            ("Accept", "application/json, text/plain, */*"),
            ("Origin", "https://comunica.pje.jus.br"),
            ("Referer", "https://comunica.pje.jus.br/"),
        ])
    }

    fn read_page_count(&self, probe: &RawPage, _request: &SearchRequest) -> Result<PageCount, ScraperError> {
        let body: CountBody = probe.json()?;
        let results = body
            .count
            .or(body.total)
            .ok_or_else(|| ParseError::new("response is missing `count` and `total`"))?;
        Ok(PageCount::from_results(results, PAGE_SIZE))
    }

    fn parse_page(&self, raw: &RawPage) -> Result<PageResult, ScraperError> {
        let body: ItemsBody = raw.json()?;
        let items = body
            .itens
            .ok_or_else(|| ParseError::new("response is missing `itens`"))?;
        Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(fields) => Some(fields),
                _ => None,
            })
            .collect())
    }
}
