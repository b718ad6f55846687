//! Testing utilities for source adapters and the engine.
//!
//! This module provides:
//! - [`StubAdapter`], a JSON-speaking adapter with call counters
//! - [`StubTransport`], an in-memory source serving a fixed catalog
//! - [`ManualClock`], re-exported so tests never sleep for real

mod adapter;
mod transport;

pub use crate::ratelimit::ManualClock;
pub use adapter::StubAdapter;
pub use transport::{stub_record, StubTransport};
