//! Storage backends.
//!
//! This module provides:
//! - The [`RecordSource`] trait the retrieval engine drives
//! - A capability record describing what each backend can do natively
//! - Adapters over a key/value client and a search client
//! - In-memory stores implementing both client traits
//!
//! The engine never branches on backend identity; it only reads
//! [`Capabilities`].

pub mod keyvalue;
pub mod memory;
pub mod search;

use crate::error_handling::DbqError;
use crate::projection::Record;
use crate::query::QuerySpec;

// Re-export public API
pub use keyvalue::{Collection, KeyValueClient, KeyValueSource, NodeInfo};
pub use search::{SearchClient, SearchPage, SearchRequest, SearchSource};

/// What a backend supports natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Short backend name used in messages
    pub name: &'static str,
    /// Filter conditions are evaluated by the store
    pub native_filtering: bool,
    /// Sort keys are applied by the store
    pub native_sort: bool,
    /// Large result sets are paged through a server-side cursor
    pub cursoring: bool,
    /// Every record carries its primary key
    pub guaranteed_keys: bool,
    /// Full-record results include the key as `pk`
    pub embeds_key_in_body: bool,
    /// Upper bound on keys per point-lookup request
    pub max_chunk_size: Option<usize>,
    /// Largest result that may be returned in memory without a sink
    pub in_memory_ceiling: usize,
}

/// Visitor verdict during a traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanFlow {
    /// Keep delivering records
    Continue,
    /// Stop the traversal; no further records are requested
    Stop,
}

/// Receives records during a traversal.
pub trait ScanVisitor {
    /// Called before each physical request for more records.
    fn requesting(&mut self) {}

    /// Handles one delivered record.
    fn visit(&mut self, record: Record) -> Result<ScanFlow, DbqError>;
}

impl<F> ScanVisitor for F
where
    F: FnMut(Record) -> Result<ScanFlow, DbqError>,
{
    fn visit(&mut self, record: Record) -> Result<ScanFlow, DbqError> {
        self(record)
    }
}

/// A store the retrieval engine can read from.
#[allow(async_fn_in_trait)]
pub trait RecordSource {
    /// Static capabilities of this backend.
    fn capabilities(&self) -> Capabilities;

    /// Human-readable name of the collection (`namespace.set`, index name).
    fn describe(&self) -> String;

    /// Fetches one chunk of keys in a single physical request.
    ///
    /// Stores without native filtering return every requested key, with a
    /// bodiless record for keys they did not find; the engine filters.
    async fn lookup(&self, keys: &[String], spec: &QuerySpec) -> Result<Vec<Record>, DbqError>;

    /// Validates the collection before a traversal and returns its total
    /// record count when the store reports one.
    async fn prepare_scan(&self, spec: &QuerySpec) -> Result<Option<u64>, DbqError>;

    /// Streams records to `visitor` until the store is exhausted or the
    /// visitor returns [`ScanFlow::Stop`]. `limit` caps the records a
    /// natively filtering store needs to produce. [`ScanVisitor::requesting`]
    /// runs before every physical request.
    ///
    /// Returns the number of physical requests issued. An error returned by
    /// the visitor ends the traversal and is returned as-is.
    async fn traverse(
        &self,
        spec: &QuerySpec,
        limit: Option<usize>,
        visitor: &mut dyn ScanVisitor,
    ) -> Result<usize, DbqError>;

    /// Counts records matching the query's conditions.
    async fn count(&self, spec: &QuerySpec) -> Result<u64, DbqError>;
}
