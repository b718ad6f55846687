//! Mapping of HTTP responses onto the error taxonomy.

use crate::errors::{ApiError, NetworkError, RateLimitError, ScraperError};
use crate::transport::RawPage;
use chrono::{DateTime, Utc};

/// Turns a response into either a usable page or a classified error.
///
/// - 429, and 503 carrying `Retry-After`: [`RateLimitError`] (retryable)
/// - 408 and other 5xx: [`NetworkError`] (retryable)
/// - any other 4xx: [`ApiError`] (fatal)
pub fn classify_response(page: RawPage, now: DateTime<Utc>) -> Result<RawPage, ScraperError> {
    match page.status {
        429 => Err(RateLimitError::new(429, page.retry_after(now)).into()),
        503 if page.header("retry-after").is_some() => {
            Err(RateLimitError::new(503, page.retry_after(now)).into())
        }
        408 => Err(NetworkError::timeout("server reported request timeout (HTTP 408)").into()),
        status if status >= 500 => Err(NetworkError::server_error(status).into()),
        status if status >= 400 => Err(ApiError::new(status, &page.body).into()),
        _ => Ok(page),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(page: RawPage) -> Result<RawPage, ScraperError> {
        classify_response(page, Utc::now())
    }

    #[test]
    fn test_success_passes_through() {
        let page = classify(RawPage::ok("<html></html>")).unwrap();
        assert_eq!(page.body, "<html></html>");
    }

    #[test]
    fn test_throttling_is_rate_limit() {
        let err = classify(RawPage::new(429, "").with_header("Retry-After", "3")).unwrap_err();
        match err {
            ScraperError::RateLimit(e) => {
                assert_eq!(e.retry_after, Some(std::time::Duration::from_secs(3)));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = classify(RawPage::new(503, "").with_header("Retry-After", "10")).unwrap_err();
        assert_eq!(err.kind(), "RateLimitError");
    }

    #[test]
    fn test_server_errors_are_retryable_network_errors() {
        for status in [500, 502, 503, 504] {
            let err = classify(RawPage::new(status, "oops")).unwrap_err();
            assert_eq!(err.kind(), "NetworkError");
            assert!(err.is_retryable());
        }
    }

    #[test]
    fn test_client_errors_are_fatal() {
        let err = classify(RawPage::new(401, "invalid api-key")).unwrap_err();
        assert_eq!(err.kind(), "APIError");
        assert!(!err.is_retryable());
    }
}
