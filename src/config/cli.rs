//! Command-line options.
//!
//! The CLI runs queries against a JSON-lines data file loaded into one of
//! the in-memory stores, which makes every retrieval mode available without
//! a live cluster.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;

use crate::config::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_LOOKUP_WORKERS, DEFAULT_MAX_RECORDS, DEFAULT_MAX_SCANS,
};
use crate::config::types::{LogFormat, LogLevel, ScanLimits};
use crate::error_handling::ConfigurationError;
use crate::query::{date_filter, FilterCondition};

/// Prefix marking a filter value as a date (`created__gte=date:2024-01-01`).
pub const DATE_VALUE_PREFIX: &str = "date:";

/// Command-line options.
///
/// # Examples
///
/// ```bash
/// # Point lookups, streamed to CSV
/// dbq get --source users.jsonl --pks a,b,c --select pk,name --save-file out.csv --save-format csv
///
/// # First 5 active users
/// dbq scan --source users.jsonl --filter status=\"active\" --max-records 5
///
/// # Count on the search backend
/// dbq count --backend search --source users.jsonl --filter age__gte=18
/// ```
#[derive(Debug, Parser)]
#[command(
    name = "dbq",
    about = "Queries and bulk-exports records from key/value and search stores."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    pub log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain, global = true)]
    pub log_format: LogFormat,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch records by primary key
    Get(GetArgs),
    /// Traverse the collection under count limits
    Scan(ScanArgs),
    /// Count matching records
    Count(QueryArgs),
}

impl Command {
    /// Query options shared by every subcommand.
    pub fn query(&self) -> &QueryArgs {
        match self {
            Command::Get(args) => &args.query,
            Command::Scan(args) => &args.query,
            Command::Count(args) => args,
        }
    }
}

/// Which store the data file is loaded into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Key/value store: client-side filtering, no sort
    Kv,
    /// Search store: native filtering, sort and scrolling
    Search,
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Backend to emulate
    #[arg(long, value_enum, default_value_t = BackendKind::Kv)]
    pub backend: BackendKind,

    /// JSON-lines data file, one record per line
    #[arg(long)]
    pub source: PathBuf,

    /// Record field holding the primary key
    #[arg(long, default_value = "id")]
    pub key_field: String,

    /// Key/value namespace
    #[arg(long, default_value = "test")]
    pub namespace: String,

    /// Key/value set, or search index name
    #[arg(long, default_value = "records")]
    pub set: String,
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Condition every record must meet, as `path[__op]=value` (repeatable)
    #[arg(long = "filter")]
    pub filters: Vec<String>,

    /// Condition that drops a record when it matches (repeatable)
    #[arg(long = "exclude")]
    pub exclusions: Vec<String>,

    /// Optional condition, search backend only (repeatable)
    #[arg(long = "should")]
    pub alternatives: Vec<String>,

    /// Fields to return, comma separated (`pk` for the key, `a__b` for nested)
    #[arg(long, value_delimiter = ',')]
    pub select: Vec<String>,

    /// Sort keys, comma separated (`-field` for descending), search backend only
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub sort: Vec<String>,
}

#[derive(Debug, Args)]
pub struct OutputArgs {
    /// Stream results to this file instead of stdout
    #[arg(long)]
    pub save_file: Option<PathBuf>,

    /// Output file format: json|csv
    #[arg(long, default_value = "json")]
    pub save_format: String,
}

#[derive(Debug, Args)]
pub struct GetArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Primary keys, comma separated
    #[arg(long, value_delimiter = ',')]
    pub pks: Option<Vec<String>>,

    /// File of primary keys (any whitespace or punctuation separates keys)
    #[arg(long)]
    pub pk_file: Option<PathBuf>,

    /// Keys per lookup request
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Lookup requests in flight at once
    #[arg(long, default_value_t = DEFAULT_LOOKUP_WORKERS)]
    pub workers: usize,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Stop after keeping this many records (-1 for no limit)
    #[arg(long, default_value_t = DEFAULT_MAX_RECORDS as i64, allow_negative_numbers = true)]
    pub max_records: i64,

    /// Stop after scanning this many records (-1 for no limit; key/value backend only)
    #[arg(long, default_value_t = DEFAULT_MAX_SCANS as i64, allow_negative_numbers = true)]
    pub max_scans: i64,

    #[command(flatten)]
    pub output: OutputArgs,
}

impl ScanArgs {
    pub fn limits(&self) -> ScanLimits {
        ScanLimits::from_sentinels(self.max_records, self.max_scans)
    }
}

/// Parses a `path[__op]=value` condition.
///
/// The value is read as JSON when it parses (`5`, `true`, `null`, `["a","b"]`),
/// as a date when prefixed with `date:`, and as a plain string otherwise.
pub fn parse_condition(raw: &str) -> Result<FilterCondition, ConfigurationError> {
    let Some((key, text)) = raw.split_once('=') else {
        return Err(ConfigurationError::InvalidFilterValue {
            condition: raw.to_string(),
            expected: "a `key=value` pair",
        });
    };
    if let Some(date) = text.strip_prefix(DATE_VALUE_PREFIX) {
        return FilterCondition::parse(key, date_filter(date)?);
    }
    let value = serde_json::from_str::<Value>(text).unwrap_or_else(|_| Value::String(text.to_string()));
    FilterCondition::parse(key, value)
}

/// Parses every condition, failing on the first bad one.
pub fn parse_conditions(raw: &[String]) -> Result<Vec<FilterCondition>, ConfigurationError> {
    raw.iter().map(|c| parse_condition(c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FilterOp, FilterValue};
    use serde_json::json;

    #[test]
    fn test_parse_condition_json_value() {
        let c = parse_condition("age__gte=18").unwrap();
        assert_eq!(c.op(), FilterOp::Gte);
        assert!(matches!(c.value(), FilterValue::Json(v) if *v == json!(18)));

        let c = parse_condition(r#"country__in=["IN",null]"#).unwrap();
        assert!(matches!(c.value(), FilterValue::Json(v) if *v == json!(["IN", null])));
    }

    #[test]
    fn test_parse_condition_string_fallback() {
        let c = parse_condition("status=active").unwrap();
        assert!(matches!(c.value(), FilterValue::Json(Value::String(s)) if s == "active"));
    }

    #[test]
    fn test_parse_condition_date_prefix() {
        let c = parse_condition("created__gte=date:2024-01-31").unwrap();
        assert!(matches!(c.value(), FilterValue::DateTime(_)));
        assert!(parse_condition("created__gte=date:31/01/2024").is_err());
    }

    #[test]
    fn test_parse_condition_requires_equals() {
        assert!(matches!(
            parse_condition("status"),
            Err(ConfigurationError::InvalidFilterValue { .. })
        ));
    }

    #[test]
    fn test_value_may_contain_equals() {
        let c = parse_condition("expr=a=b").unwrap();
        assert!(matches!(c.value(), FilterValue::Json(Value::String(s)) if s == "a=b"));
    }
}
