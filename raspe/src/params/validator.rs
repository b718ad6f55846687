//! Request validation, run before any network access.

use super::request::{RawRequest, SearchRequest};
use crate::adapter::SourceAdapter;
use crate::errors::ValidationError;
use tracing::debug;

/// Turns a [`RawRequest`] into a canonical [`SearchRequest`].
///
/// Generic checks (terms, page range, dates) run first; the adapter's
/// [`SourceAdapter::validate_source_params`] hook runs only if they pass.
/// Validation is pure and never touches the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterValidator;

impl ParameterValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Runs the source-independent checks only.
    pub fn normalize(&self, raw: RawRequest) -> Result<SearchRequest, ValidationError> {
        SearchRequest::from_raw(raw)
    }

    /// Runs the generic checks, then the adapter's own.
    pub fn validate(
        &self,
        raw: RawRequest,
        adapter: &dyn SourceAdapter,
    ) -> Result<SearchRequest, ValidationError> {
        let request = self.normalize(raw)?;
        adapter.validate_source_params(&request)?;
        debug!(
            source = %adapter.identity().name,
            terms = request.terms().len(),
            "request validated"
        );
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubAdapter;
    use chrono::NaiveDate;

    #[test]
    fn test_reversed_dates_fail_before_adapter_hook() {
        let adapter = StubAdapter::bounded("stub");
        let raw = RawRequest::new("saúde").with_dates("2024-12-31", "2024-01-01");

        let err = ParameterValidator::new().validate(raw, &adapter).unwrap_err();

        assert!(matches!(err, ValidationError::ReversedDateRange { .. }));
        assert_eq!(adapter.validate_calls(), 0);
    }

    #[test]
    fn test_mixed_notation_same_day() {
        let adapter = StubAdapter::bounded("stub");
        let raw = RawRequest::new("saúde").with_dates("2024-01-15", "15/01/2024");

        let request = ParameterValidator::new().validate(raw, &adapter).unwrap();

        assert_eq!(request.dates().start(), NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(request.dates().start(), request.dates().end());
        assert_eq!(adapter.validate_calls(), 1);
    }

    #[test]
    fn test_adapter_rejection_is_surfaced() {
        let adapter = StubAdapter::bounded("stub").with_required_filter("api_key");
        let err = ParameterValidator::new()
            .validate(RawRequest::new("saúde"), &adapter)
            .unwrap_err();
        assert_eq!(err, ValidationError::missing("api_key"));
    }
}
