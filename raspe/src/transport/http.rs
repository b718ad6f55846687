//! `reqwest`-backed transport.

use super::models::{HttpMethod, PageQuery, RawPage};
use super::protocols::Transport;
use crate::config::FetchConfig;
use crate::errors::{ErrorContext, NetworkError, ScraperError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use std::collections::HashMap;
use std::time::Instant;
use tracing::trace;

/// HTTP transport with a shared connection pool and cookie jar.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: FetchConfig,
}

impl HttpTransport {
    /// Builds a client from the fetch configuration.
    pub fn new(config: FetchConfig) -> Result<Self, ScraperError> {
        let mut headers = HeaderMap::new();
        for (key, value) in &config.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| ScraperError::Config(format!("invalid header name '{key}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ScraperError::Config(format!("invalid value for header '{key}': {e}")))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout())
            .redirect(Policy::limited(config.max_redirects))
            .cookie_store(true)
            .build()
            .map_err(|e| ScraperError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Returns the fetch configuration.
    #[must_use]
    pub const fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn network_error(err: &reqwest::Error, url: &str) -> NetworkError {
    let error = if err.is_timeout() {
        NetworkError::timeout(err.to_string())
    } else {
        NetworkError::new(err.to_string())
    };
    error.with_context(ErrorContext::new().with_url(url))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, query: &PageQuery) -> Result<RawPage, NetworkError> {
        let started = Instant::now();
        let mut request = match query.method {
            HttpMethod::Get => self.client.get(&query.url).query(&query.params),
            HttpMethod::Post => self.client.post(&query.url).form(&query.params),
        };
        for (key, value) in &query.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| network_error(&e, &query.url))?;

        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| network_error(&e, &query.url))?;

        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        trace!(%query, status, duration_ms, bytes = body.len(), "response received");

        Ok(RawPage {
            status,
            headers,
            body,
            url,
            duration_ms,
        })
    }
}
