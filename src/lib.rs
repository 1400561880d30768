//! dbq library: one query and bulk-export API over key/value and search stores
//!
//! Callers build a query once (filter / exclude / should / select / sort) and
//! run it against any [`RecordSource`]: point lookups by primary key, scans
//! under count limits, and counts. Large results stream to a JSON-lines or
//! CSV file instead of being held in memory.
//!
//! # Example
//!
//! ```no_run
//! use dbq::backend::memory::MemoryKeyValueStore;
//! use dbq::{Collection, FilterCondition, GetOptions, KeyValueSource, Objects};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let collection = Collection::new("test", "users");
//! let store = MemoryKeyValueStore::new(collection.clone())
//!     .with_record("a", json!({"name": "Asha", "status": "active"}))
//!     .with_record("b", json!({"name": "Ben", "status": "closed"}));
//!
//! let mut users = Objects::new(KeyValueSource::new(store, collection));
//! users
//!     .filter([FilterCondition::parse("status", json!("active"))?])
//!     .select(["pk", "name"]);
//!
//! let retrieval = users.get(GetOptions::keys(["a", "b"])).await?;
//! assert_eq!(retrieval.records, vec![json!({"pk": "a", "name": "Asha"})]);
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your application
//! or ensure you're calling library functions within an async context.

pub mod app;
pub mod backend;
pub mod config;
pub mod engine;
pub mod error_handling;
pub mod export;
pub mod initialization;
pub mod predicate;
pub mod projection;
pub mod query;
pub mod translate;

// Re-export public API
pub use backend::{
    Capabilities, Collection, KeyValueClient, KeyValueSource, RecordSource, ScanFlow, ScanVisitor,
    SearchClient, SearchSource,
};
pub use config::{LogFormat, LogLevel, ScanLimits, SearchSettings};
pub use engine::{GetOptions, KeySource, Objects, Retrieval, ScanOptions};
pub use error_handling::{
    BackendError, ConfigurationError, DbqError, ResourceError, RetrievalStats,
};
pub use export::{ExportFormat, SinkConfig};
pub use projection::Record;
pub use query::{date_filter, FieldPath, FilterCondition, FilterOp, QuerySpec};
