//! Configuration types.
//!
//! This module defines the policies handed to backend clients, the scan
//! limits, and the logging options used by the CLI.

use std::time::Duration;

use clap::ValueEnum;

use crate::config::constants::{
    DEFAULT_MAX_RECORDS, DEFAULT_MAX_SCANS, DEFAULT_REQUEST_TIMEOUT, READ_MAX_RETRIES,
    READ_SLEEP_BETWEEN_RETRIES_MS, READ_TOTAL_TIMEOUT_MS, SCROLL_KEEP_ALIVE, SEARCH_PAGE_SIZE,
};

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Policy passed to the key/value client for every multi-get.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPolicy {
    /// Client-side retries per request
    pub max_retries: u32,
    /// Total time budget per request
    pub total_timeout: Duration,
    /// Pause between retries
    pub sleep_between_retries: Duration,
    /// Issue sub-requests to partitions in parallel
    pub concurrent: bool,
}

impl Default for ReadPolicy {
    fn default() -> Self {
        Self {
            max_retries: READ_MAX_RETRIES,
            total_timeout: Duration::from_millis(READ_TOTAL_TIMEOUT_MS),
            sleep_between_retries: Duration::from_millis(READ_SLEEP_BETWEEN_RETRIES_MS),
            concurrent: true,
        }
    }
}

/// Server-side priority of a key/value scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPriority {
    /// Let the server decide
    Auto,
    /// Background priority (default)
    Low,
    /// Normal priority
    Medium,
    /// Foreground priority
    High,
}

/// Policy passed to the key/value client for a full-set scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPolicy {
    /// Scan partitions in parallel on the server
    pub concurrent: bool,
    /// Scan priority
    pub priority: ScanPriority,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            concurrent: true,
            priority: ScanPriority::Low,
        }
    }
}

/// Request settings for the search backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSettings {
    /// Timeout applied to every search call
    pub request_timeout: Duration,
    /// Scroll cursor lifetime between page fetches
    pub keep_alive: Duration,
    /// Page-size ceiling; larger requests use a scroll cursor
    pub page_size: usize,
    /// Release the scroll cursor once the scan finishes
    pub clear_scroll: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            keep_alive: SCROLL_KEEP_ALIVE,
            page_size: SEARCH_PAGE_SIZE,
            clear_scroll: true,
        }
    }
}

/// Count ceilings for a scan. `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanLimits {
    /// Stop once this many records have been kept
    pub max_records: Option<usize>,
    /// Stop once this many records have been observed. Ignored by stores
    /// that filter natively.
    pub max_scans: Option<usize>,
}

impl ScanLimits {
    /// Converts the CLI sentinel form, where `-1` means unbounded.
    pub fn from_sentinels(max_records: i64, max_scans: i64) -> Self {
        let bound = |n: i64| if n < 0 { None } else { Some(n as usize) };
        Self {
            max_records: bound(max_records),
            max_scans: bound(max_scans),
        }
    }

    /// No ceilings at all.
    pub fn unbounded() -> Self {
        Self {
            max_records: None,
            max_scans: None,
        }
    }
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            max_records: Some(DEFAULT_MAX_RECORDS),
            max_scans: Some(DEFAULT_MAX_SCANS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(
            log::LevelFilter::from(LogLevel::Error),
            log::LevelFilter::Error
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Warn),
            log::LevelFilter::Warn
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Info),
            log::LevelFilter::Info
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Debug),
            log::LevelFilter::Debug
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Trace),
            log::LevelFilter::Trace
        );
    }

    #[test]
    fn test_read_policy_default() {
        let policy = ReadPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.total_timeout, Duration::from_millis(3000));
        assert_eq!(policy.sleep_between_retries, Duration::from_millis(200));
        assert!(policy.concurrent);
    }

    #[test]
    fn test_scan_policy_default_is_low_priority() {
        let policy = ScanPolicy::default();
        assert!(policy.concurrent);
        assert_eq!(policy.priority, ScanPriority::Low);
    }

    #[test]
    fn test_search_settings_default() {
        let settings = SearchSettings::default();
        assert_eq!(settings.page_size, 2000);
        assert_eq!(settings.keep_alive, Duration::from_secs(300));
        assert_eq!(settings.request_timeout, Duration::from_secs(10));
        assert!(settings.clear_scroll);
    }

    #[test]
    fn test_scan_limits_sentinels() {
        let limits = ScanLimits::from_sentinels(5, -1);
        assert_eq!(limits.max_records, Some(5));
        assert_eq!(limits.max_scans, None);

        let limits = ScanLimits::from_sentinels(-1, -1);
        assert_eq!(limits, ScanLimits::unbounded());
    }

    #[test]
    fn test_scan_limits_default() {
        let limits = ScanLimits::default();
        assert_eq!(limits.max_records, Some(20));
        assert_eq!(limits.max_scans, Some(100_000));
    }
}
