//! Export types and options.

use std::path::{Path, PathBuf};

use strum_macros::{AsRefStr, EnumString};

use crate::error_handling::ConfigurationError;

/// Export file format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ExportFormat {
    /// One JSON document per line (nested values preserved)
    Json,
    /// Header row plus one row per record, columns in select order
    Csv,
}

impl ExportFormat {
    /// Parses `json` or `csv`.
    ///
    /// # Errors
    ///
    /// `UnsupportedFormat` for anything else.
    pub fn parse(raw: &str) -> Result<Self, ConfigurationError> {
        raw.parse()
            .map_err(|_| ConfigurationError::UnsupportedFormat(raw.to_string()))
    }
}

/// Where and how a retrieval streams its results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SinkConfig {
    /// Output file; truncated when the retrieval starts
    pub path: PathBuf,
    /// Output format
    pub format: ExportFormat,
}

impl SinkConfig {
    pub fn new(path: impl Into<PathBuf>, format: ExportFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    /// JSON-lines sink.
    pub fn json(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ExportFormat::Json)
    }

    /// CSV sink.
    pub fn csv(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ExportFormat::Csv)
    }

    /// Builds a sink from a path and a format name.
    pub fn parse(path: &Path, format: &str) -> Result<Self, ConfigurationError> {
        Ok(Self::new(path, ExportFormat::parse(format)?))
    }
}
