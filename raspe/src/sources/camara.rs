//! Câmara dos Deputados: federal legislation search.

use crate::adapter::html::{first_attr, first_text, missing_listing, selector, text_of};
use crate::adapter::{PageCount, SourceAdapter, SourceIdentity};
use crate::aggregate::{record, PageResult};
use crate::errors::ScraperError;
use crate::params::SearchRequest;
use crate::transport::{PageQuery, RawPage};
use regex::Regex;
use scraper::Html;
use std::sync::LazyLock;

const HOME_URL: &str = "https://www.camara.leg.br/";
const SEARCH_URL: &str = "https://www.camara.leg.br/legislacao/busca";

static TOTAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"de\s+([\d.]+)").expect("Invalid total regex"));

/// Adapter for the Câmara legislation search.
///
/// The site rejects cold searches, so the adapter visits the home and
/// search pages first to pick up session cookies. Filters: `tipo_materia`,
/// `ano`.
#[derive(Debug, Clone)]
pub struct CamaraAdapter {
    identity: SourceIdentity,
}

impl Default for CamaraAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl CamaraAdapter {
    /// Creates the adapter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            identity: SourceIdentity::html("camara", SEARCH_URL).with_record_type("norma"),
        }
    }
}

impl SourceAdapter for CamaraAdapter {
    fn identity(&self) -> &SourceIdentity {
        &self.identity
    }

    fn build_query(&self, term: &str, page: u32, request: &SearchRequest) -> PageQuery {
        let mut query = PageQuery::get(SEARCH_URL)
            .with_param("ordenacao", "data:ASC")
            .with_param("abrangencia", "Legislação Federal")
            .with_param("pagina", page.to_string());
        if let Some(tipo) = request.filter("tipo_materia") {
            query = query.with_param("tipo", tipo);
        }
        if let Some(ano) = request.filter("ano") {
            query = query.with_param("ano", ano);
        }
        query.with_param("geral", term).with_header("Referer", SEARCH_URL)
    }

    fn read_page_count(&self, probe: &RawPage, _request: &SearchRequest) -> Result<PageCount, ScraperError> {
        let document = Html::parse_document(&probe.body);
        let info = selector("div.busca-info__resultado--informado")?;
        let text = document.select(&info).next().map(|e| text_of(&e)).unwrap_or_default();

        // "Exibindo 1 - 10 de 2.345": the total follows the last "de".
        let results = TOTAL
            .captures_iter(&text)
            .last()
            .and_then(|c| c[1].replace('.', "").parse().ok())
            .unwrap_or(0);
        Ok(PageCount::from_results(results, self.identity.page_size))
    }

    fn parse_page(&self, raw: &RawPage) -> Result<PageResult, ScraperError> {
        let document = Html::parse_document(&raw.body);
        let listing = selector("div.resultado-busca")?;
        let ul = selector("ul")?;
        let li = selector("li")?;
        let a = selector("a")?;
        let div_p = selector("div p")?;
        let situacao = selector("p.busca-resultados__situacao")?;

        let Some(listing) = document.select(&listing).next() else {
            return missing_listing(&document, &["nenhum resultado", "não foram encontrad"], "result listing");
        };
        let Some(list) = listing.select(&ul).next() else {
            return Ok(PageResult::empty());
        };

        let rows = list
            .select(&li)
            .filter_map(|item| {
                let link = item.select(&a).next()?;
                Some(record([
                    ("link", first_attr(&item, &a, "href").unwrap_or_default()),
                    ("titulo", text_of(&link)),
                    ("descricao", first_text(&item, &div_p)),
                    ("ementa", first_text(&item, &situacao)),
                ]))
            })
            .collect();
        Ok(rows)
    }

    fn warmup_queries(&self) -> Vec<PageQuery> {
        vec![
            PageQuery::get(HOME_URL),
            PageQuery::get(SEARCH_URL).with_header("Referer", HOME_URL),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParameterValidator, RawRequest};
    use pretty_assertions::assert_eq;

    const LISTING: &str = r#"
        <div class="busca-info__resultado busca-info__resultado--informado">Exibindo 1 - 20 de 2.345</div>
        <div class="resultado-busca">
          <ul>
            <li>
              <a href="https://www2.camara.leg.br/legin/fed/lei/1996/lei-9394-20-dezembro-1996-362578-norma-pl.html">Lei nº 9.394, de 20/12/1996</a>
              <div><p>Estabelece as diretrizes e bases da educação nacional.</p></div>
              <p class="busca-resultados__situacao">Situação: Em vigor</p>
            </li>
            <li><span>sem link</span></li>
          </ul>
        </div>"#;

    #[test]
    fn test_query_shape() {
        let request = ParameterValidator::new()
            .normalize(RawRequest::new("educação").with_filter("ano", "1996"))
            .unwrap();
        let query = CamaraAdapter::new().build_query("educação", 4, &request);

        assert_eq!(query.param("pagina"), Some("4"));
        assert_eq!(query.param("ano"), Some("1996"));
        assert_eq!(query.param("geral"), Some("educação"));
        assert_eq!(query.param("tipo"), None);
    }

    #[test]
    fn test_count_uses_last_total() {
        let request = ParameterValidator::new().normalize(RawRequest::new("x")).unwrap();
        let count = CamaraAdapter::new()
            .read_page_count(&RawPage::ok(LISTING), &request)
            .unwrap();
        assert_eq!(count, PageCount::Exact(235));
    }

    #[test]
    fn test_parses_items_with_links() {
        let page = CamaraAdapter::new().parse_page(&RawPage::ok(LISTING)).unwrap();

        assert_eq!(page.len(), 1);
        let row = &page.records()[0];
        assert_eq!(row["titulo"], "Lei nº 9.394, de 20/12/1996");
        assert_eq!(row["descricao"], "Estabelece as diretrizes e bases da educação nacional.");
        assert_eq!(row["ementa"], "Situação: Em vigor");
    }

    #[test]
    fn test_warmup_visits_home_then_search() {
        let urls: Vec<String> = CamaraAdapter::new()
            .warmup_queries()
            .into_iter()
            .map(|q| q.url)
            .collect();
        assert_eq!(urls, vec![HOME_URL, SEARCH_URL]);
    }
}
