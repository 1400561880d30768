//! Backend-agnostic query model.
//!
//! This module provides:
//! - Filter conditions parsed from `<path>__<operator>` keys
//! - The `QuerySpec` builder (filter / exclude / should / select / sort)
//! - Date helpers for filter values and stored timestamps

mod condition;
mod dates;
mod spec;

// Re-export public API
pub use condition::{FieldPath, FilterCondition, FilterOp, FilterValue, Predicate};
pub use dates::{date_filter, DATE_FILTER_FORMATS};
pub(crate) use dates::coerce_stored_timestamp;
pub use spec::{QuerySpec, SortKey};
