//! What happens when a term fails.

use crate::errors::ScraperError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How to handle a term whose collection fails fatally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail the whole invocation on the first failed term (default).
    #[default]
    AbortAll,
    /// Record the failure and keep the other terms' rows.
    SkipFailedTerms,
}

/// Record of a term skipped under [`FailurePolicy::SkipFailedTerms`].
#[derive(Debug, Clone, Serialize)]
pub struct TermFailure {
    /// Position of the term in the request.
    pub index: usize,
    /// The term.
    pub term: String,
    /// Error kind name.
    pub error_type: String,
    /// Error message.
    pub message: String,
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
    /// Structured error details.
    pub details: HashMap<String, serde_json::Value>,
    #[serde(skip)]
    error: ScraperError,
}

impl TermFailure {
    /// Creates a failure record.
    #[must_use]
    pub fn new(index: usize, term: impl Into<String>, error: ScraperError) -> Self {
        Self {
            index,
            term: term.into(),
            error_type: error.kind().to_string(),
            message: error.to_string(),
            timestamp: Utc::now(),
            details: error.to_dict(),
            error,
        }
    }

    /// The underlying error.
    #[must_use]
    pub const fn error(&self) -> &ScraperError {
        &self.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ParseError;

    #[test]
    fn test_default_policy_aborts() {
        assert_eq!(FailurePolicy::default(), FailurePolicy::AbortAll);
    }

    #[test]
    fn test_failure_record_carries_error() {
        let failure = TermFailure::new(2, "saúde", ParseError::new("no listing").into());
        assert_eq!(failure.error_type, "ParseError");
        assert_eq!(failure.error().kind(), "ParseError");
        assert!(failure.message.contains("no listing"));
        assert_eq!(failure.details.get("retryable"), Some(&serde_json::json!(false)));
    }
}
