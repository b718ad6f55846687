//! CFM: norms of the Federal and Regional Councils of Medicine.

use crate::adapter::html::{missing_listing, selector, text_of};
use crate::adapter::{PageCount, SourceAdapter, SourceIdentity};
use crate::aggregate::{PageResult, Record};
use crate::errors::ScraperError;
use crate::params::SearchRequest;
use crate::transport::{PageQuery, RawPage};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

const SEARCH_URL: &str = "https://portal.cfm.org.br/buscar-normas-cfm-e-crm/";
const COLUMNS: [&str; 6] = ["Tipo", "UF", "Nº/Ano", "Situação", "Ementa", "Link"];
const NORM_TYPES: [&str; 5] = ["R", "P", "E", "N", "D"];

static RECORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s+registros encontrados").expect("Invalid record count regex"));
static SHOWING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Mostrando página (\d+) de (\d+)").expect("Invalid pagination regex"));

/// Adapter for the CFM/CRM norm search.
///
/// Searches resolutions, opinions, amendments, norms and decisions.
/// Filters: `uf`, `revogada`, `numero`, `ano`.
#[derive(Debug, Clone)]
pub struct CfmAdapter {
    identity: SourceIdentity,
}

impl Default for CfmAdapter {
    fn default() -> Self {
        Self::new()
    }
}

struct ArticleSelectors {
    header_item: Selector,
    strong: Selector,
    p: Selector,
    summary: Selector,
    link: Selector,
}

impl CfmAdapter {
    /// Creates the adapter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            identity: SourceIdentity::html("cfm", SEARCH_URL).with_record_type("norma"),
        }
    }

    fn parse_article(article: &ElementRef<'_>, s: &ArticleSelectors) -> Option<Record> {
        let mut fields: Vec<(String, String)> = article
            .select(&s.header_item)
            .filter_map(|item| {
                let key = item.select(&s.strong).next()?;
                let value = item.select(&s.p).next()?;
                Some((text_of(&key), text_of(&value)))
            })
            .collect();
        if let Some(summary) = article.select(&s.summary).next() {
            fields.push(("Ementa".to_string(), text_of(&summary)));
        }
        if let Some(href) = article.select(&s.link).next().and_then(|a| a.value().attr("href")) {
            fields.push(("Link".to_string(), href.trim().to_string()));
        }
        if !fields.iter().any(|(k, _)| k == "Tipo") {
            return None;
        }

        let value = |column: &str| {
            fields
                .iter()
                .find(|(k, _)| k == column)
                .map(|(_, v)| v.clone())
                .unwrap_or_default()
        };
        Some(
            COLUMNS
                .iter()
                .map(|column| ((*column).to_string(), Value::String(value(column))))
                .collect(),
        )
    }
}

impl SourceAdapter for CfmAdapter {
    fn identity(&self) -> &SourceIdentity {
        &self.identity
    }

    fn build_query(&self, term: &str, page: u32, request: &SearchRequest) -> PageQuery {
        let query = NORM_TYPES
            .iter()
            .enumerate()
            .fold(PageQuery::get(SEARCH_URL), |q, (i, kind)| q.with_param(format!("tipo[{i}]"), *kind));
        ["uf", "revogada", "numero", "ano"]
            .into_iter()
            .fold(query, |q, key| q.with_param(key, request.filters().get_or(key, "")))
            .with_param("ta", "OU")
            .with_param("assunto[0]", "")
            .with_param("texto", term)
            .with_param("pagina", page.to_string())
            .with_header("Referer", "https://portal.cfm.org.br/buscar-normas-cfm-e-crm")
    }

    fn read_page_count(&self, probe: &RawPage, _request: &SearchRequest) -> Result<PageCount, ScraperError> {
        let document = Html::parse_document(&probe.body);
        let text = document.root_element().text().collect::<String>();
        let Some(records) = RECORDS.captures(&text).and_then(|c| c[1].parse::<u32>().ok()) else {
            debug!("cfm record count not found");
            return Ok(PageCount::Exact(0));
        };

        let info = selector("div.pt-3")?;
        let showing = document
            .select(&info)
            .find_map(|div| SHOWING.captures(&text_of(&div)).and_then(|c| c[2].parse().ok()));
        if let Some(pages) = showing {
            return Ok(PageCount::Exact(pages));
        }

        let nav = selector("a.link-navigation")?;
        let highest = document
            .select(&nav)
            .filter_map(|a| text_of(&a).parse::<u32>().ok())
            .max();
        Ok(PageCount::Exact(highest.unwrap_or(u32::from(records > 0))))
    }

    fn parse_page(&self, raw: &RawPage) -> Result<PageResult, ScraperError> {
        let document = Html::parse_document(&raw.body);
        let results = selector("div#resultsNormas")?;
        let article = selector("article")?;
        let selectors = ArticleSelectors {
            header_item: selector("div.card-header ul li")?,
            strong: selector("strong")?,
            p: selector("p")?,
            summary: selector("div.card-body span")?,
            link: selector("div.card-body a.btn.btn-primary")?,
        };

        let Some(results) = document.select(&results).next() else {
            return missing_listing(&document, &["0 registros encontrados", "nenhum registro"], "norm results");
        };
        Ok(results
            .select(&article)
            .filter_map(|a| Self::parse_article(&a, &selectors))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParameterValidator, RawRequest};
    use pretty_assertions::assert_eq;

    const LISTING: &str = r#"
        <p>23 registros encontrados</p>
        <div class="pt-3">Mostrando página 1 de 3</div>
        <div id="resultsNormas">
          <article>
            <div class="card-header"><ul>
              <li><strong>Tipo</strong><p>Resolução</p></li>
              <li><strong>UF</strong><p>BR</p></li>
              <li><strong>Nº/Ano</strong><p>2.381/2024</p></li>
              <li><strong>Situação</strong><p>Vigente</p></li>
            </ul></div>
            <div class="card-body">
              <span>Dispõe sobre doenças raras.</span>
              <a class="btn btn-primary" href="https://sistemas.cfm.org.br/normas/visualizar/resolucoes/BR/2024/2381">Ver</a>
            </div>
          </article>
          <article><div class="card-body"><span>Sem cabeçalho</span></div></article>
        </div>"#;

    fn request() -> SearchRequest {
        ParameterValidator::new()
            .normalize(RawRequest::new("doenças raras").with_filter("uf", "SP"))
            .unwrap()
    }

    #[test]
    fn test_query_lists_all_norm_types() {
        let query = CfmAdapter::new().build_query("doenças raras", 2, &request());

        assert_eq!(query.param("tipo[0]"), Some("R"));
        assert_eq!(query.param("tipo[4]"), Some("D"));
        assert_eq!(query.param("uf"), Some("SP"));
        assert_eq!(query.param("ano"), Some(""));
        assert_eq!(query.param("texto"), Some("doenças raras"));
        assert_eq!(query.param("pagina"), Some("2"));
    }

    #[test]
    fn test_count_prefers_pagination_banner() {
        let adapter = CfmAdapter::new();
        assert_eq!(
            adapter.read_page_count(&RawPage::ok(LISTING), &request()).unwrap(),
            PageCount::Exact(3)
        );

        let links = r#"<p>12 registros encontrados</p>
            <a class="link-navigation">1</a><a class="link-navigation">2</a><a class="link-navigation">Próxima</a>"#;
        assert_eq!(
            adapter.read_page_count(&RawPage::ok(links), &request()).unwrap(),
            PageCount::Exact(2)
        );

        assert_eq!(
            adapter.read_page_count(&RawPage::ok("<p>3 registros encontrados</p>"), &request()).unwrap(),
            PageCount::Exact(1)
        );
        assert_eq!(
            adapter.read_page_count(&RawPage::ok("<p>sem contagem</p>"), &request()).unwrap(),
            PageCount::Exact(0)
        );
    }

    #[test]
    fn test_parses_articles_into_fixed_columns() {
        let page = CfmAdapter::new().parse_page(&RawPage::ok(LISTING)).unwrap();

        assert_eq!(page.len(), 1);
        let row = &page.records()[0];
        assert_eq!(row.keys().collect::<Vec<_>>(), COLUMNS.to_vec());
        assert_eq!(row["Nº/Ano"], "2.381/2024");
        assert_eq!(row["Ementa"], "Dispõe sobre doenças raras.");
        assert_eq!(
            row["Link"],
            "https://sistemas.cfm.org.br/normas/visualizar/resolucoes/BR/2024/2381"
        );
    }
}
