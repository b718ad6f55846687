//! HTTP transport boundary.
//!
//! Adapters describe requests as [`PageQuery`] values; a [`Transport`]
//! executes them and hands back a [`RawPage`].

#[cfg(feature = "http")]
mod http;
mod models;
mod protocols;

#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use models::{HttpMethod, PageQuery, RawPage};
#[cfg(test)]
pub use protocols::MockTransport;
pub use protocols::Transport;
