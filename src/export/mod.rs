//! Export of retrieval results.
//!
//! This module provides a file sink that writes records in batches as
//! JSON lines or CSV, so large retrievals never have to be held in memory.

mod csv;
mod jsonl;
mod sink;
mod types;

pub use sink::ExportSink;
pub use types::{ExportFormat, SinkConfig};
