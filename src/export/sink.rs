//! Export sink.
//!
//! A sink truncates its file once at the start of a retrieval and then
//! appends one batch at a time. Every batch is flushed and synced before
//! `write_batch` returns, so a failure later in the retrieval leaves all
//! earlier batches on disk.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::Value;

use super::csv::write_csv_rows;
use super::jsonl::write_jsonl;
use super::types::{ExportFormat, SinkConfig};
use crate::error_handling::{ConfigurationError, ResourceError};

/// Batch writer for one export file.
#[derive(Debug)]
pub struct ExportSink {
    config: SinkConfig,
    columns: Vec<String>,
    started: bool,
    flushes: usize,
    written: usize,
}

impl ExportSink {
    /// Validates the configuration without touching the file.
    ///
    /// # Errors
    ///
    /// `CsvRequiresSelect` for a CSV sink with no columns.
    pub fn create(config: SinkConfig, columns: Vec<String>) -> Result<Self, ConfigurationError> {
        if config.format == ExportFormat::Csv && columns.is_empty() {
            return Err(ConfigurationError::CsvRequiresSelect);
        }
        Ok(Self {
            config,
            columns,
            started: false,
            flushes: 0,
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn format(&self) -> ExportFormat {
        self.config.format
    }

    /// Non-empty batches written so far.
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Records written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Truncates (or creates) the file and writes the CSV header. Called
    /// implicitly by the first `write_batch`.
    pub fn begin(&mut self) -> Result<(), ResourceError> {
        let file = File::create(&self.config.path).map_err(|source| self.open_error(source))?;
        self.started = true;
        log::debug!("Opened export file {}", self.config.path.display());
        self.write_to(file, &[], true)
    }

    /// Appends `records` and syncs the file. Returns the number written.
    pub fn write_batch(&mut self, records: &[Value]) -> Result<usize, ResourceError> {
        if !self.started {
            self.begin()?;
        }
        if records.is_empty() {
            return Ok(0);
        }

        let file = OpenOptions::new()
            .append(true)
            .open(&self.config.path)
            .map_err(|source| self.open_error(source))?;
        self.write_to(file, records, false)?;

        self.flushes += 1;
        self.written += records.len();
        log::debug!(
            "Flushed batch of {} records to {} ({} total)",
            records.len(),
            self.config.path.display(),
            self.written
        );
        Ok(records.len())
    }

    fn write_to(&self, file: File, records: &[Value], fresh: bool) -> Result<(), ResourceError> {
        let mut writer = BufWriter::new(file);
        match self.config.format {
            ExportFormat::Json => {
                write_jsonl(&mut writer, records).map_err(|source| self.write_error(source))?
            }
            ExportFormat::Csv => {
                write_csv_rows(&mut writer, &self.columns, records, fresh).map_err(|source| {
                    ResourceError::Csv {
                        path: self.config.path.clone(),
                        source,
                    }
                })?
            }
        }
        let file = writer
            .into_inner()
            .map_err(|e| self.write_error(e.into_error()))?;
        file.sync_all().map_err(|source| self.write_error(source))
    }

    fn open_error(&self, source: std::io::Error) -> ResourceError {
        ResourceError::Open {
            path: self.config.path.clone(),
            source,
        }
    }

    fn write_error(&self, source: std::io::Error) -> ResourceError {
        ResourceError::Write {
            path: self.config.path.clone(),
            source,
        }
    }
}
