//! Configuration constants.
//!
//! This module defines the fixed limits and defaults used throughout the
//! retrieval engine.

use std::time::Duration;

/// Delimiter joining nested path segments in select and filter keys (`a__b__c`).
pub const PATH_DELIMITER: &str = "__";

/// Reserved select/filter key that always means the record's primary key.
pub const PRIMARY_KEY_FIELD: &str = "pk";

/// Document-id field the search backend stores primary keys under.
pub const SEARCH_ID_FIELD: &str = "_id";

/// Observed-record interval between progress log lines during a key/value scan.
/// The kept-but-unflushed buffer is also flushed at this interval when a sink is active.
pub const PROGRESS_INTERVAL: usize = 50_000;

/// Page-size ceiling for search requests, also the maximum ids per search lookup.
/// Requests for more records than this open a scroll cursor instead.
pub const SEARCH_PAGE_SIZE: usize = 2000;

/// Lifetime of a server-side scroll cursor between page fetches.
pub const SCROLL_KEEP_ALIVE: Duration = Duration::from_secs(5 * 60);

/// Per-request timeout for search calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest key/value scan result that may be held in memory without a sink.
pub const KEY_VALUE_IN_MEMORY_CEILING: usize = 100_000;

/// Default number of keys per physical multi-get request.
pub const DEFAULT_BATCH_SIZE: usize = 5000;

/// Default kept-record ceiling for scans.
pub const DEFAULT_MAX_RECORDS: usize = 20;

/// Default observed-record ceiling for key/value scans.
pub const DEFAULT_MAX_SCANS: usize = 100_000;

/// Default number of concurrent lookup requests.
pub const DEFAULT_LOOKUP_WORKERS: usize = 1;

/// Token pattern for primary-key files: any run of letters, digits,
/// underscore, `.`, `@` or `-`. Everything else separates tokens.
pub const KEY_TOKEN_PATTERN: &str = r"[\w@.-]+";

// Key/value read policy defaults
/// Retries the key/value client performs per multi-get.
pub const READ_MAX_RETRIES: u32 = 3;
/// Total time budget for one multi-get, in milliseconds.
pub const READ_TOTAL_TIMEOUT_MS: u64 = 3000;
/// Pause between key/value read retries, in milliseconds.
pub const READ_SLEEP_BETWEEN_RETRIES_MS: u64 = 200;
