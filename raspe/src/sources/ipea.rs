//! IPEA: publications of the Institute for Applied Economic Research.

use crate::adapter::html::{first_attr, first_text, missing_listing, parse_count, selector};
use crate::adapter::{PageCount, SourceAdapter, SourceIdentity};
use crate::aggregate::{record, PageResult};
use crate::errors::ScraperError;
use crate::params::SearchRequest;
use crate::transport::{PageQuery, RawPage};
use scraper::Html;

const SEARCH_URL: &str = "https://www.ipea.gov.br/portal/coluna-5/central-de-conteudo/busca-publicacoes";
const SITE: &str = "https://www.ipea.gov.br";

/// Adapter for the IPEA publication search.
#[derive(Debug, Clone)]
pub struct IpeaAdapter {
    identity: SourceIdentity,
}

impl Default for IpeaAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl IpeaAdapter {
    /// Creates the adapter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            identity: SourceIdentity::html("ipea", SEARCH_URL).with_record_type("publicacao"),
        }
    }
}

fn absolute(href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else {
        format!("{SITE}{href}")
    }
}

impl SourceAdapter for IpeaAdapter {
    fn identity(&self) -> &SourceIdentity {
        &self.identity
    }

    fn build_query(&self, term: &str, page: u32, _request: &SearchRequest) -> PageQuery {
        PageQuery::get(SEARCH_URL)
            .with_param("palavra_chave", term)
            .with_param("tipo", "")
            .with_param("assunto", "")
            .with_param("autor", "")
            .with_param("timeperiods", "all")
            .with_param("data-inicial", "")
            .with_param("data-final", "")
            .with_param("pagina", page.to_string())
    }

    fn read_page_count(&self, probe: &RawPage, _request: &SearchRequest) -> Result<PageCount, ScraperError> {
        let document = Html::parse_document(&probe.body);
        let total = selector("div.col.clearfix h4 strong")?;
        let results = document
            .select(&total)
            .next()
            .and_then(|e| parse_count(&e.text().collect::<String>()))
            .unwrap_or(0);
        Ok(PageCount::from_results(results, self.identity.page_size))
    }

    fn parse_page(&self, raw: &RawPage) -> Result<PageResult, ScraperError> {
        let document = Html::parse_document(&raw.body);
        let listing = selector("div.lista-publicacoes")?;
        let div = selector("div")?;
        let row = selector("div.row")?;
        let content = selector("div.publi-conteudo")?;
        let title = selector("h3 a")?;
        let authors = selector("div.autores")?;
        let date = selector("p")?;
        let subjects = selector("div.assuntos")?;

        let Some(listing) = document.select(&listing).next() else {
            return missing_listing(&document, &["nenhum resultado", "nenhuma publica"], "publication list");
        };
        let Some(container) = listing.select(&div).next() else {
            return Ok(PageResult::empty());
        };

        let rows = container
            .select(&row)
            .filter_map(|row| row.select(&content).next())
            .filter_map(|item| {
                let href = first_attr(&item, &title, "href")?;
                Some(record([
                    ("titulo", first_text(&item, &title)),
                    ("link", absolute(&href)),
                    ("autores", first_text(&item, &authors)),
                    ("data", first_text(&item, &date)),
                    ("assuntos", first_text(&item, &subjects)),
                ]))
            })
            .collect();
        Ok(rows)
    }
}
