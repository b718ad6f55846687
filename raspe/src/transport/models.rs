//! Request and response shapes exchanged with the transport.

use crate::errors::ParseError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// HTTP method used by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HttpMethod {
    /// Parameters travel in the query string.
    #[default]
    Get,
    /// Parameters travel as a form body.
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// A fully described request for one page.
///
/// Parameters keep insertion order; some sources are sensitive to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    /// HTTP method.
    pub method: HttpMethod,
    /// Endpoint URL without query string.
    pub url: String,
    /// Query or form parameters.
    pub params: Vec<(String, String)>,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
}

impl PageQuery {
    /// Creates a GET query.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            params: Vec::new(),
            headers: Vec::new(),
        }
    }

    /// Creates a POST query.
    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            ..Self::get(url)
        }
    }

    /// Appends a parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Appends a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Appends a set of static headers.
    #[must_use]
    pub fn with_headers(mut self, headers: &[(&str, &str)]) -> Self {
        self.headers
            .extend(headers.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())));
        self
    }

    /// Returns the first value of a parameter.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for PageQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self
                .params
                .iter()
                .filter(|(k, _)| !k.eq_ignore_ascii_case("api-key"))
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            write!(f, "?{}", params.join("&"))?;
        }
        Ok(())
    }
}

/// A transport response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPage {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, keys lower-cased.
    pub headers: HashMap<String, String>,
    /// Decoded response body.
    pub body: String,
    /// Final URL after redirects.
    pub url: String,
    /// Round-trip time in milliseconds.
    pub duration_ms: f64,
}

impl RawPage {
    /// Creates a response with a status and body.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            ..Self::default()
        }
    }

    /// Creates a 200 response.
    #[must_use]
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.insert(key.to_ascii_lowercase(), value.into());
        self
    }

    /// Sets the final URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Looks up a header, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Parses `Retry-After` as delta-seconds or an HTTP date relative to `now`.
    #[must_use]
    pub fn retry_after(&self, now: DateTime<Utc>) -> Option<Duration> {
        let value = self.header("retry-after")?.trim();
        if let Ok(seconds) = value.parse::<u64>() {
            return Some(Duration::from_secs(seconds));
        }
        let at = DateTime::parse_from_rfc2822(value).ok()?;
        (at.with_timezone(&Utc) - now).to_std().ok()
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ParseError> {
        serde_json::from_str(&self.body)
            .map_err(|e| ParseError::new(format!("response is not valid JSON: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_query_builder_keeps_param_order() {
        let query = PageQuery::get("https://example.org/busca")
            .with_param("q", "saúde")
            .with_param("p", "2");
        assert_eq!(query.param("p"), Some("2"));
        assert_eq!(query.to_string(), "GET https://example.org/busca?q=saúde&p=2");
    }

    #[test]
    fn test_display_hides_api_key() {
        let query = PageQuery::get("https://api.example.org")
            .with_param("q", "x")
            .with_param("api-key", "secret");
        assert!(!query.to_string().contains("secret"));
    }

    #[test]
    fn test_retry_after_seconds_and_date() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let page = RawPage::new(429, "").with_header("Retry-After", "7");
        assert_eq!(page.retry_after(now), Some(Duration::from_secs(7)));

        let page = RawPage::new(503, "").with_header("retry-after", "Wed, 01 May 2024 12:00:30 GMT");
        assert_eq!(page.retry_after(now), Some(Duration::from_secs(30)));

        assert_eq!(RawPage::new(429, "").retry_after(now), None);
    }
}
