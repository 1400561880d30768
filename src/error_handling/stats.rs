//! Retrieval statistics.

use std::fmt;

/// Counters collected over one retrieval call.
///
/// `observed` counts every record the backend handed over, `kept` those that
/// survived filtering. They differ only when predicates run client-side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrievalStats {
    /// Physical backend requests issued (multi-gets, queries, pages).
    pub requests: usize,
    /// Records received from the backend.
    pub observed: usize,
    /// Records that passed every filter.
    pub kept: usize,
    /// Non-empty batches flushed to the export sink.
    pub flushes: usize,
    /// Records written to the export sink.
    pub written: usize,
}

impl RetrievalStats {
    /// Folds another set of counters into this one.
    pub fn absorb(&mut self, other: &RetrievalStats) {
        self.requests += other.requests;
        self.observed += other.observed;
        self.kept += other.kept;
        self.flushes += other.flushes;
        self.written += other.written;
    }
}

impl fmt::Display for RetrievalStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "requests={}, scanned={}, kept={}, flushes={}, written={}",
            self.requests, self.observed, self.kept, self.flushes, self.written
        )
    }
}
