//! Search request parameters.
//!
//! This module provides:
//! - Date normalization across the accepted notations
//! - The caller-facing [`RawRequest`] and the canonical [`SearchRequest`]
//! - [`ParameterValidator`], which composes generic and per-source checks
//! - Boolean search-expression expansion

mod dates;
mod expression;
mod request;
mod validator;

pub use dates::{parse_date, DateFormat, DateRange};
pub use expression::expand;
pub use request::{Filters, PageRange, RawRequest, SearchRequest, SearchTerms};
pub use validator::ParameterValidator;
