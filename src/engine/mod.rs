//! Retrieval engine.
//!
//! [`Objects`] is the single entry point over any [`RecordSource`]. It holds
//! the query being built and runs the three retrievals:
//! - `get`: batched point lookups by primary key
//! - `scan`: full traversal (key/value scan or search scroll) under count limits
//! - `count`: number of matching records
//!
//! Behaviour differences between backends come only from their
//! [`Capabilities`].

mod keys;
mod scan;

use std::path::PathBuf;

use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use serde_json::Value;

use crate::backend::{Capabilities, RecordSource};
use crate::config::{ScanLimits, DEFAULT_BATCH_SIZE, DEFAULT_LOOKUP_WORKERS};
use crate::error_handling::{ConfigurationError, DbqError, RetrievalStats};
use crate::export::{ExportSink, SinkConfig};
use crate::predicate::record_matches;
use crate::projection::{project, Record};
use crate::query::{FilterCondition, QuerySpec};
use crate::translate::translate;

// Re-export public API
pub use keys::{key_tokens, KeyChunks, KeySource};
pub use scan::ScanPhase;

use scan::ScanState;

/// Options for a point-lookup retrieval.
#[derive(Debug, Clone)]
pub struct GetOptions {
    /// Keys to fetch
    pub keys: KeySource,
    /// Stream results to this file instead of returning them
    pub sink: Option<SinkConfig>,
    /// Keys per physical request (capped by the backend's chunk limit)
    pub batch_size: usize,
    /// Lookup requests kept in flight at once
    pub workers: usize,
}

impl GetOptions {
    pub fn new(keys: KeySource) -> Self {
        Self {
            keys,
            sink: None,
            batch_size: DEFAULT_BATCH_SIZE,
            workers: DEFAULT_LOOKUP_WORKERS,
        }
    }

    /// Lookup of an in-memory key list.
    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(KeySource::List(keys.into_iter().map(Into::into).collect()))
    }

    /// Lookup of the keys listed in a file.
    pub fn key_file(path: impl Into<PathBuf>) -> Self {
        Self::new(KeySource::File(path.into()))
    }

    pub fn with_sink(mut self, sink: SinkConfig) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}

/// Options for a scan retrieval.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Kept/observed ceilings
    pub limits: ScanLimits,
    /// Stream results to this file instead of returning them
    pub sink: Option<SinkConfig>,
}

impl ScanOptions {
    pub fn new(limits: ScanLimits) -> Self {
        Self { limits, sink: None }
    }

    pub fn with_sink(mut self, sink: SinkConfig) -> Self {
        self.sink = Some(sink);
        self
    }
}

/// Outcome of one retrieval.
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    /// Projected records; empty when they were streamed to a sink
    pub records: Vec<Value>,
    /// Request and record counters
    pub stats: RetrievalStats,
    /// Collection size reported by the store before a scan, if any
    pub total: Option<u64>,
    /// Export file, when a sink was used
    pub exported_to: Option<PathBuf>,
}

/// Query builder and retrieval entry point over one backend.
pub struct Objects<S> {
    source: S,
    spec: QuerySpec,
    key_selection_unreliable: bool,
}

impl<S: RecordSource> Objects<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            spec: QuerySpec::new(),
            key_selection_unreliable: false,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    pub fn capabilities(&self) -> Capabilities {
        self.source.capabilities()
    }

    /// Replaces the `must` conditions.
    pub fn filter<I>(&mut self, conditions: I) -> &mut Self
    where
        I: IntoIterator<Item = FilterCondition>,
    {
        self.spec.filter(conditions);
        self
    }

    /// Replaces the `must_not` conditions.
    pub fn exclude<I>(&mut self, conditions: I) -> &mut Self
    where
        I: IntoIterator<Item = FilterCondition>,
    {
        self.spec.exclude(conditions);
        self
    }

    /// Replaces the `should` conditions.
    ///
    /// # Errors
    ///
    /// `MissingCapability` on a backend without native filtering.
    pub fn should<I>(&mut self, conditions: I) -> Result<&mut Self, ConfigurationError>
    where
        I: IntoIterator<Item = FilterCondition>,
    {
        let caps = self.source.capabilities();
        if !caps.native_filtering {
            return Err(ConfigurationError::MissingCapability {
                backend: caps.name,
                feature: "should conditions",
            });
        }
        self.spec.should(conditions);
        Ok(self)
    }

    /// Replaces the projected paths.
    ///
    /// Selecting `pk` on a backend that does not always return keys is
    /// allowed but logged, and flagged in [`key_selection_unreliable`](Self::key_selection_unreliable).
    pub fn select<I, P>(&mut self, paths: I) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        self.spec.select(paths);
        let caps = self.source.capabilities();
        self.key_selection_unreliable = self.spec.selects_primary_key() && !caps.guaranteed_keys;
        if self.key_selection_unreliable {
            warn!(
                "pk selected on {}: keys are only returned for records written with a key-sending policy",
                self.source.describe()
            );
        }
        self
    }

    /// Replaces the sort keys (`-field` for descending).
    ///
    /// # Errors
    ///
    /// `MissingCapability` on a backend without native sorting.
    pub fn sort<I, P>(&mut self, keys: I) -> Result<&mut Self, ConfigurationError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let caps = self.source.capabilities();
        if !caps.native_sort {
            return Err(ConfigurationError::MissingCapability {
                backend: caps.name,
                feature: "sort",
            });
        }
        self.spec.sort(keys);
        Ok(self)
    }

    /// True when `pk` is selected but the backend may not return it.
    pub fn key_selection_unreliable(&self) -> bool {
        self.key_selection_unreliable
    }

    /// Fetches records by primary key.
    ///
    /// Keys are split into chunks of `batch_size` (capped by the backend's
    /// chunk limit); each chunk is one physical request. With a sink, every
    /// chunk's survivors are written before the next chunk is processed and
    /// nothing is returned in memory.
    ///
    /// # Errors
    ///
    /// - `InvalidBatchSize` for a zero batch size
    /// - `SinkRequired` for key files, or key lists above the in-memory
    ///   ceiling of a cursoring backend, without a sink
    /// - `CsvRequiresSelect` for a CSV sink with nothing selected
    /// - `BackendError` from any lookup, which stops the remaining chunks
    pub async fn get(&self, options: GetOptions) -> Result<Retrieval, DbqError> {
        let caps = self.source.capabilities();
        if options.batch_size == 0 {
            return Err(ConfigurationError::InvalidBatchSize.into());
        }
        if options.sink.is_none() {
            match &options.keys {
                KeySource::File(_) => {
                    return Err(ConfigurationError::SinkRequired("pk_file lookups".into()).into())
                }
                KeySource::List(keys)
                    if caps.cursoring && keys.len() > caps.in_memory_ceiling =>
                {
                    return Err(ConfigurationError::SinkRequired(format!(
                        "lookups of more than {} pks",
                        caps.in_memory_ceiling
                    ))
                    .into())
                }
                KeySource::List(_) => {}
            }
        }
        self.check_translatable(&caps)?;

        let mut sink = options
            .sink
            .map(|config| ExportSink::create(config, self.spec.select_names()))
            .transpose()?;

        let chunk_size = caps
            .max_chunk_size
            .map_or(options.batch_size, |max| options.batch_size.min(max));
        let chunks = options.keys.into_chunks(chunk_size)?;
        if let Some(sink) = sink.as_mut() {
            sink.begin()?;
        }

        let source = &self.source;
        let spec = &self.spec;
        let mut lookups = stream::iter(chunks)
            .map(|chunk| async move {
                let keys = chunk?;
                debug!("Looking up {} keys in {}", keys.len(), source.describe());
                let records = source.lookup(&keys, spec).await?;
                Ok::<_, DbqError>(records)
            })
            .buffered(options.workers.max(1));

        let mut stats = RetrievalStats::default();
        let mut records: Vec<Value> = Vec::new();
        while let Some(fetched) = lookups.next().await {
            let fetched = match fetched {
                Ok(fetched) => fetched,
                Err(e) => {
                    error!(
                        "Lookup on {} failed after {} requests: {}",
                        source.describe(),
                        stats.requests,
                        e
                    );
                    return Err(e);
                }
            };
            stats.requests += 1;
            stats.observed += fetched.len();

            let kept = self.keep_and_project(&caps, fetched)?;
            stats.kept += kept.len();
            match sink.as_mut() {
                Some(sink) => {
                    sink.write_batch(&kept)?;
                }
                None => records.extend(kept),
            }
        }

        if let Some(sink) = &sink {
            stats.flushes = sink.flushes();
            stats.written = sink.written();
        }
        info!("Lookup on {} finished: {}", self.source.describe(), stats);
        Ok(Retrieval {
            records,
            stats,
            total: None,
            exported_to: sink.map(|s| s.path().to_path_buf()),
        })
    }

    fn keep_and_project(
        &self,
        caps: &Capabilities,
        fetched: Vec<Record>,
    ) -> Result<Vec<Value>, DbqError> {
        let mut kept = Vec::with_capacity(fetched.len());
        for record in fetched {
            let keep = if caps.native_filtering {
                record.body().is_some()
            } else {
                record_matches(&self.spec, &record)
            };
            if keep {
                kept.push(project(
                    &record,
                    self.spec.selected(),
                    caps.embeds_key_in_body,
                )?);
            }
        }
        Ok(kept)
    }

    /// Traverses the collection, keeping records that match the query.
    ///
    /// Stops once `max_records` records are kept or, on a store without native
    /// filtering, once `max_scans` records are observed. With a sink, kept records are flushed in batches and
    /// nothing is returned in memory. On a backend error the records kept so
    /// far are still flushed before the error is returned.
    ///
    /// # Errors
    ///
    /// - `SinkRequired` for an unbounded or large scan without a sink
    /// - `EmptyCollection` when the store reports no records
    /// - `BackendError` from the traversal
    pub async fn scan(&self, options: ScanOptions) -> Result<Retrieval, DbqError> {
        let caps = self.source.capabilities();
        let limits = options.limits;
        if options.sink.is_none() {
            let too_many = limits
                .max_records
                .map_or(true, |n| n > caps.in_memory_ceiling);
            let unbounded_scan = !caps.native_filtering && limits.max_scans.is_none();
            if too_many || unbounded_scan {
                return Err(ConfigurationError::SinkRequired(
                    "unbounded or large scans".into(),
                )
                .into());
            }
        }
        self.check_translatable(&caps)?;

        let sink = options
            .sink
            .map(|config| ExportSink::create(config, self.spec.select_names()))
            .transpose()?;

        let total = self.source.prepare_scan(&self.spec).await?;
        if let Some(total) = total {
            info!("Scanning {} ({} records)", self.source.describe(), total);
        } else {
            info!("Scanning {}", self.source.describe());
        }

        let mut state = ScanState::new(&self.spec, caps, limits, total, sink);
        state.open_sink()?;

        let limit = if caps.native_filtering {
            limits.max_records
        } else {
            None
        };
        let traversed = self
            .source
            .traverse(&self.spec, limit, &mut state)
            .await;

        match traversed {
            Ok(requests) => state.finish(requests),
            Err(e) => Err(state.fail(e)),
        }
    }

    /// Counts records matching the query.
    ///
    /// # Errors
    ///
    /// `MissingCapability` for a filtered count on a backend without native
    /// filtering; `EmptyCollection` for an empty key/value set.
    pub async fn count(&self) -> Result<u64, DbqError> {
        let caps = self.source.capabilities();
        self.check_translatable(&caps)?;
        match self.source.count(&self.spec).await {
            Ok(count) => {
                info!("Count on {}: {}", self.source.describe(), count);
                Ok(count)
            }
            Err(e) => {
                error!("Count on {} failed: {}", self.source.describe(), e);
                Err(e)
            }
        }
    }

    /// Rejects untranslatable conditions before any I/O on native backends.
    fn check_translatable(&self, caps: &Capabilities) -> Result<(), ConfigurationError> {
        if caps.native_filtering {
            translate(&self.spec)?;
        }
        Ok(())
    }
}
