//! Error handling and retrieval statistics.
//!
//! This module provides:
//! - The error taxonomy (configuration, backend, resource)
//! - Retrieval counters reported back to callers
//!
//! Errors are categorized into:
//! - **Configuration**: invalid or contradictory input, raised before I/O where possible
//! - **Backend**: failures reported by the store, surfaced without retry
//! - **Resource**: failures opening or writing local files

mod stats;
mod types;

// Re-export public API
pub use stats::RetrievalStats;
pub use types::{BackendError, ConfigurationError, DbqError, InitializationError, ResourceError};
