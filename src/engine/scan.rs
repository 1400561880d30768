//! Per-scan state.
//!
//! One [`ScanState`] exists per scan call. The traversal callback updates it
//! in place: counters, the kept-but-unflushed buffer, and the phase.

use std::fmt;

use log::{error, info, trace};
use serde_json::Value;

use crate::backend::{Capabilities, ScanFlow, ScanVisitor};
use crate::config::{ScanLimits, PROGRESS_INTERVAL};
use crate::error_handling::{DbqError, RetrievalStats};
use crate::export::ExportSink;
use crate::predicate::record_matches;
use crate::projection::{project, Record};
use crate::query::QuerySpec;

use super::Retrieval;

/// Lifecycle of one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Requesting,
    Emitting,
    Draining,
    Closed,
    Failed,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

pub(crate) struct ScanState<'a> {
    spec: &'a QuerySpec,
    capabilities: Capabilities,
    limits: ScanLimits,
    total: Option<u64>,
    phase: ScanPhase,
    observed: usize,
    kept: usize,
    flush_threshold: usize,
    buffer: Vec<Value>,
    sink: Option<ExportSink>,
}

impl<'a> ScanState<'a> {
    pub(crate) fn new(
        spec: &'a QuerySpec,
        capabilities: Capabilities,
        limits: ScanLimits,
        total: Option<u64>,
        sink: Option<ExportSink>,
    ) -> Self {
        let flush_threshold = if capabilities.cursoring {
            capabilities.max_chunk_size.unwrap_or(PROGRESS_INTERVAL)
        } else {
            PROGRESS_INTERVAL
        };
        Self {
            spec,
            capabilities,
            limits,
            total,
            phase: ScanPhase::Idle,
            observed: 0,
            kept: 0,
            flush_threshold,
            buffer: Vec::new(),
            sink,
        }
    }

    pub(crate) fn phase(&self) -> ScanPhase {
        self.phase
    }

    pub(crate) fn transition(&mut self, next: ScanPhase) {
        if self.phase != next {
            trace!("Scan phase {} -> {}", self.phase, next);
            self.phase = next;
        }
    }

    /// Truncates the sink file, if any, before the first record arrives.
    pub(crate) fn open_sink(&mut self) -> Result<(), DbqError> {
        if let Some(sink) = self.sink.as_mut() {
            sink.begin()?;
        }
        Ok(())
    }

    /// `max_scans` only bounds stores that filter client-side; a natively
    /// filtering store only delivers records that are kept.
    fn limit_reached(&self) -> bool {
        let scans_exhausted = !self.capabilities.native_filtering
            && self.limits.max_scans.is_some_and(|n| self.observed >= n);
        scans_exhausted || self.limits.max_records.is_some_and(|n| self.kept >= n)
    }

    /// Handles one record delivered by the backend.
    pub(crate) fn offer(&mut self, record: Record) -> Result<ScanFlow, DbqError> {
        if self.limit_reached() {
            return Ok(ScanFlow::Stop);
        }
        self.transition(ScanPhase::Emitting);
        self.observed += 1;

        let keep = if self.capabilities.native_filtering {
            record.body().is_some()
        } else {
            record_matches(self.spec, &record)
        };
        if keep {
            let projected = project(
                &record,
                self.spec.selected(),
                self.capabilities.embeds_key_in_body,
            )?;
            self.buffer.push(projected);
            self.kept += 1;
        }

        if self.observed % PROGRESS_INTERVAL == 0 {
            self.log_progress();
            self.flush()?;
        } else if self.buffer.len() >= self.flush_threshold {
            self.flush()?;
        }

        if self.limit_reached() {
            return Ok(ScanFlow::Stop);
        }
        Ok(ScanFlow::Continue)
    }

    fn log_progress(&self) {
        match self.total {
            Some(total) => info!(
                "Total records: {}, scanned: {}, kept: {}",
                total, self.observed, self.kept
            ),
            None => info!("Scanned: {}, kept: {}", self.observed, self.kept),
        }
    }

    /// Writes the buffer to the sink. Without a sink the buffer is the
    /// in-memory result and is left alone.
    fn flush(&mut self) -> Result<(), DbqError> {
        if let Some(sink) = self.sink.as_mut() {
            sink.write_batch(&self.buffer)?;
            self.buffer.clear();
        }
        Ok(())
    }

    /// Drains the buffer and closes the scan.
    pub(crate) fn finish(mut self, requests: usize) -> Result<Retrieval, DbqError> {
        self.transition(ScanPhase::Draining);
        self.flush()?;
        self.transition(ScanPhase::Closed);
        info!(
            "Scan finished: scanned {}, kept {}",
            self.observed, self.kept
        );
        Ok(self.into_retrieval(requests))
    }

    /// Drains what was kept so far, marks the scan failed and hands the
    /// error back for the caller to return.
    pub(crate) fn fail(&mut self, err: DbqError) -> DbqError {
        self.transition(ScanPhase::Draining);
        if let Err(flush_err) = self.flush() {
            error!("Failed to flush kept records after scan error: {}", flush_err);
        }
        self.transition(ScanPhase::Failed);
        error!(
            "Scan failed after scanning {} and keeping {}: {}",
            self.observed, self.kept, err
        );
        err
    }

    fn into_retrieval(self, requests: usize) -> Retrieval {
        let (flushes, written, exported_to) = match &self.sink {
            Some(sink) => (sink.flushes(), sink.written(), Some(sink.path().to_path_buf())),
            None => (0, 0, None),
        };
        Retrieval {
            records: self.buffer,
            stats: RetrievalStats {
                requests,
                observed: self.observed,
                kept: self.kept,
                flushes,
                written,
            },
            total: self.total,
            exported_to,
        }
    }
}

impl ScanVisitor for ScanState<'_> {
    fn requesting(&mut self) {
        self.transition(ScanPhase::Requesting);
    }

    fn visit(&mut self, record: Record) -> Result<ScanFlow, DbqError> {
        self.offer(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KEY_VALUE_IN_MEMORY_CEILING;
    use crate::query::FilterCondition;
    use serde_json::json;

    fn search_capabilities() -> Capabilities {
        Capabilities {
            name: "search",
            native_filtering: true,
            native_sort: true,
            cursoring: true,
            guaranteed_keys: true,
            embeds_key_in_body: true,
            max_chunk_size: Some(2),
            in_memory_ceiling: 2,
        }
    }

    fn kv_capabilities() -> Capabilities {
        Capabilities {
            name: "key/value",
            native_filtering: false,
            native_sort: false,
            cursoring: false,
            guaranteed_keys: false,
            embeds_key_in_body: false,
            max_chunk_size: None,
            in_memory_ceiling: KEY_VALUE_IN_MEMORY_CEILING,
        }
    }

    fn limits(max_records: Option<usize>, max_scans: Option<usize>) -> ScanLimits {
        ScanLimits {
            max_records,
            max_scans,
        }
    }

    #[test]
    fn test_stops_when_max_records_kept() {
        let spec = QuerySpec::new();
        let mut state = ScanState::new(&spec, kv_capabilities(), limits(Some(2), None), None, None);
        assert_eq!(state.offer(Record::keyed("a", json!({"n": 1}))).unwrap(), ScanFlow::Continue);
        assert_eq!(state.offer(Record::keyed("b", json!({"n": 2}))).unwrap(), ScanFlow::Stop);
        assert_eq!(state.offer(Record::keyed("c", json!({"n": 3}))).unwrap(), ScanFlow::Stop);

        let retrieval = state.finish(1).unwrap();
        assert_eq!(retrieval.records.len(), 2);
        assert_eq!(retrieval.stats.observed, 2);
    }

    #[test]
    fn test_max_scans_counts_rejected_records() {
        let mut spec = QuerySpec::new();
        spec.filter([FilterCondition::parse("n__gt", json!(10)).unwrap()]);
        let mut state = ScanState::new(&spec, kv_capabilities(), limits(None, Some(3)), None, None);
        for n in 0..2 {
            assert_eq!(
                state.offer(Record::keyed("k", json!({ "n": n }))).unwrap(),
                ScanFlow::Continue
            );
        }
        assert_eq!(state.offer(Record::keyed("k", json!({"n": 50}))).unwrap(), ScanFlow::Stop);

        let retrieval = state.finish(1).unwrap();
        assert_eq!(retrieval.stats.observed, 3);
        assert_eq!(retrieval.stats.kept, 1);
    }

    #[test]
    fn test_zero_max_records_stops_immediately() {
        let spec = QuerySpec::new();
        let mut state = ScanState::new(&spec, kv_capabilities(), limits(Some(0), None), None, None);
        assert_eq!(state.offer(Record::keyed("a", json!({"n": 1}))).unwrap(), ScanFlow::Stop);
        assert_eq!(state.finish(1).unwrap().stats.observed, 0);
    }

    #[test]
    fn test_max_scans_ignored_for_native_filtering() {
        let spec = QuerySpec::new();
        let mut state =
            ScanState::new(&spec, search_capabilities(), limits(None, Some(1)), None, None);
        for key in ["a", "b", "c"] {
            assert_eq!(
                state.offer(Record::keyed(key, json!({"n": 1}))).unwrap(),
                ScanFlow::Continue
            );
        }
        assert_eq!(state.finish(2).unwrap().stats.kept, 3);
    }

    #[test]
    fn test_phase_transitions() {
        let spec = QuerySpec::new();
        let mut state = ScanState::new(&spec, kv_capabilities(), ScanLimits::unbounded(), None, None);
        assert_eq!(state.phase(), ScanPhase::Idle);
        state.requesting();
        assert_eq!(state.phase(), ScanPhase::Requesting);
        state.visit(Record::keyed("a", json!({"n": 1}))).unwrap();
        assert_eq!(state.phase(), ScanPhase::Emitting);
        // next page
        state.requesting();
        assert_eq!(state.phase(), ScanPhase::Requesting);
        state.visit(Record::keyed("b", json!({"n": 2}))).unwrap();
        assert_eq!(state.phase(), ScanPhase::Emitting);

        let err = state.fail(crate::error_handling::BackendError::new("scan", "boom").into());
        assert!(err.is_backend());
        assert_eq!(state.phase(), ScanPhase::Failed);
    }

    #[test]
    fn test_projection_error_propagates() {
        let mut spec = QuerySpec::new();
        spec.select(["name__first", "pk"]);
        let mut state = ScanState::new(&spec, kv_capabilities(), ScanLimits::unbounded(), None, None);
        let err = state
            .offer(Record::keyed("a", json!({"name": "flat"})))
            .unwrap_err();
        assert!(err.as_configuration().is_some());
    }
}
