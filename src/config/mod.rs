//! Configuration and constants.
//!
//! This module provides:
//! - Fixed limits and defaults (chunk sizes, scroll lifetime, progress interval)
//! - Backend client policies and scan limits
//! - Command-line options and logging options

mod cli;
mod constants;
mod types;

// Re-export all constants
pub use cli::{
    parse_condition, parse_conditions, BackendKind, Cli, Command, GetArgs, OutputArgs, QueryArgs,
    ScanArgs, SourceArgs, DATE_VALUE_PREFIX,
};
pub use constants::*;
pub use types::{
    LogFormat, LogLevel, ReadPolicy, ScanLimits, ScanPolicy, ScanPriority, SearchSettings,
};
