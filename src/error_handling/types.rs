//! Error type definitions.
//!
//! Every retrieval call returns [`DbqError`], which wraps one of three kinds:
//! configuration problems detected before (or instead of) I/O, failures
//! reported by the backing store, and failures touching local files.

use std::io;
use std::path::PathBuf;

use log::SetLoggerError;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),
}

/// Invalid or contradictory caller input.
///
/// These are raised before any backend call wherever the problem can be
/// detected up front.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Both an explicit key list and a key file were supplied.
    #[error("Only one of pks or pk_file may be supplied")]
    ConflictingKeySources,

    /// Neither an explicit key list nor a key file was supplied.
    #[error("At least one of pks or pk_file is required")]
    MissingKeySource,

    /// A field path with an empty segment (`a____b`, trailing `__`).
    #[error("Invalid filter: `{0}` contains an empty path segment")]
    InvalidPath(String),

    /// The operator suffix is not one this crate understands.
    #[error("Invalid filter: unsupported operator `{operator}` in `{condition}`")]
    UnsupportedOperator { condition: String, operator: String },

    /// An operator name appeared somewhere other than the last path segment.
    #[error("Invalid filter: operator `{operator}` must be the last segment of `{condition}`")]
    MisplacedOperator { condition: String, operator: String },

    /// The filter value cannot be used with the operator.
    #[error("Invalid filter: `{condition}` expects {expected}")]
    InvalidFilterValue {
        condition: String,
        expected: &'static str,
    },

    /// The condition has no server-side equivalent.
    #[error("Invalid filter: `{condition}` cannot be translated to a native query ({reason})")]
    NotTranslatable {
        condition: String,
        reason: &'static str,
    },

    /// Requested save format is neither `json` nor `csv`.
    #[error("Invalid file save_format: {0}")]
    UnsupportedFormat(String),

    /// CSV export needs a fixed column list.
    #[error("select attribute is required for csv dump")]
    CsvRequiresSelect,

    /// A large or unbounded retrieval was requested without a sink.
    #[error("save_file is required for {0}")]
    SinkRequired(String),

    /// The backend does not support the requested feature.
    #[error("{backend} backend does not support {feature}")]
    MissingCapability {
        backend: &'static str,
        feature: &'static str,
    },

    /// A select path walks through a value that is not a mapping.
    #[error("Invalid bin type: `{0}` traverses a non-mapping value")]
    PathShapeMismatch(String),

    /// Date text matched none of the accepted formats.
    #[error("Date '{value}' does not match any of {formats}")]
    InvalidDate { value: String, formats: String },

    /// Lookup chunk size of zero.
    #[error("batch_size must be greater than 0")]
    InvalidBatchSize,

    /// The collection reports no records at all.
    #[error("Invalid namespace-set or no records found: {0}")]
    EmptyCollection(String),
}

/// A failure reported by the underlying store.
///
/// The core never retries these; retry behaviour belongs to the client
/// policy handed to the backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed: {message}")]
pub struct BackendError {
    /// Operation that failed (`get_many`, `scan`, `search`, ...).
    pub operation: String,
    /// Message reported by the store.
    pub message: String,
}

impl BackendError {
    /// Creates a backend error for the named operation.
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Failure reading a key file or writing an export file.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The file could not be opened.
    #[error("Failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading from an open file failed.
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing or flushing an open file failed.
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A line of a JSON-lines file is not a JSON object.
    #[error("Invalid JSON at {}:{line}: {source}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// The CSV encoder rejected a row.
    #[error("Failed to write csv rows to {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Top-level error returned by every retrieval call.
#[derive(Error, Debug)]
pub enum DbqError {
    /// Caller input problem.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Store-side failure.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Local file failure.
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

impl DbqError {
    /// Returns the configuration error, if that is what this is.
    pub fn as_configuration(&self) -> Option<&ConfigurationError> {
        match self {
            DbqError::Configuration(e) => Some(e),
            _ => None,
        }
    }

    /// Returns true for store-side failures.
    pub fn is_backend(&self) -> bool {
        matches!(self, DbqError::Backend(_))
    }
}
