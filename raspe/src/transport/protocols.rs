//! The transport seam between the engine and the network.

use super::models::{PageQuery, RawPage};
use crate::errors::NetworkError;
use async_trait::async_trait;

/// Executes one HTTP request.
///
/// Implementations return any HTTP response, whatever its status, as a
/// [`RawPage`]; status classification belongs to the retry policy. Only
/// failures to obtain a response at all (timeouts, connection errors) are
/// reported as [`NetworkError`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request and returns the response.
    async fn send(&self, query: &PageQuery) -> Result<RawPage, NetworkError>;
}
