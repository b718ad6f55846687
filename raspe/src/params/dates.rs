//! Date normalization for search requests.
//!
//! Sources disagree on date notation, so callers may use any of
//! `YYYY-MM-DD`, `DD/MM/YYYY` or `YYYYMMDD`. All three normalize to the
//! same [`NaiveDate`], which adapters then render in whatever notation their
//! source expects.

use crate::errors::ValidationError;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static ISO_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("Invalid ISO date regex"));
static BR_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}/\d{2}/\d{4}$").expect("Invalid BR date regex"));
static COMPACT_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{8}$").expect("Invalid compact date regex"));

/// Date notations understood on input and produced on output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateFormat {
    /// `YYYY-MM-DD`
    Iso,
    /// `DD/MM/YYYY`
    Brazilian,
    /// `YYYYMMDD`
    Compact,
}

impl DateFormat {
    const ALL: [Self; 3] = [Self::Iso, Self::Brazilian, Self::Compact];

    /// The chrono format string for this notation.
    #[must_use]
    pub const fn pattern(self) -> &'static str {
        match self {
            Self::Iso => "%Y-%m-%d",
            Self::Brazilian => "%d/%m/%Y",
            Self::Compact => "%Y%m%d",
        }
    }

    /// Renders a date in this notation.
    #[must_use]
    pub fn format(self, date: NaiveDate) -> String {
        date.format(self.pattern()).to_string()
    }

    fn matches_shape(self, value: &str) -> bool {
        match self {
            Self::Iso => ISO_SHAPE.is_match(value),
            Self::Brazilian => BR_SHAPE.is_match(value),
            Self::Compact => COMPACT_SHAPE.is_match(value),
        }
    }
}

/// Parses one date field.
///
/// Blank input is treated as absent. A value with a recognised shape that is
/// not a real calendar day (e.g. `2024-02-30`) yields
/// [`ValidationError::ImpossibleDate`]; any other shape yields
/// [`ValidationError::InvalidDateFormat`]. Both name `field`.
pub fn parse_date(value: &str, field: &str) -> Result<Option<NaiveDate>, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    let format = DateFormat::ALL
        .into_iter()
        .find(|f| f.matches_shape(value))
        .ok_or_else(|| ValidationError::invalid_date_format(field, value))?;

    NaiveDate::parse_from_str(value, format.pattern())
        .map(Some)
        .map_err(|_| ValidationError::impossible_date(field, value))
}

/// An inclusive, possibly open-ended date interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

impl DateRange {
    /// Creates a range, rejecting a start after the end.
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self, ValidationError> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(ValidationError::ReversedDateRange { start, end });
            }
        }
        Ok(Self { start, end })
    }

    /// Parses both bounds from raw strings in any accepted notation.
    pub fn parse(
        start: Option<&str>,
        end: Option<&str>,
        start_field: &str,
        end_field: &str,
    ) -> Result<Self, ValidationError> {
        let start = start.map(|v| parse_date(v, start_field)).transpose()?.flatten();
        let end = end.map(|v| parse_date(v, end_field)).transpose()?.flatten();
        Self::new(start, end)
    }

    /// Returns the start bound.
    #[must_use]
    pub const fn start(&self) -> Option<NaiveDate> {
        self.start
    }

    /// Returns the end bound.
    #[must_use]
    pub const fn end(&self) -> Option<NaiveDate> {
        self.end
    }

    /// Returns true if neither bound is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Renders the start bound, or an empty string.
    #[must_use]
    pub fn start_as(&self, format: DateFormat) -> String {
        self.start.map(|d| format.format(d)).unwrap_or_default()
    }

    /// Renders the end bound, or an empty string.
    #[must_use]
    pub fn end_as(&self, format: DateFormat) -> String {
        self.end.map(|d| format.format(d)).unwrap_or_default()
    }
}
