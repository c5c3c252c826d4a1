// LogSift - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.
// Every configurable bound has a default, a minimum and a hard maximum.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "LogSift";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "LogSift";

/// Current application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Event store limits
// =============================================================================

/// Default cap on the number of events held by the event store.
///
/// At roughly 1 KB per event this keeps the store under 1 GB. Events past
/// the cap are rejected (not evicted) so row indices stay stable.
pub const DEFAULT_MAX_EVENTS: usize = 1_000_000;

/// Minimum user-configurable event cap.
pub const MIN_MAX_EVENTS: usize = 1_000;

/// Maximum user-configurable event cap.
pub const ABSOLUTE_MAX_EVENTS: usize = 10_000_000;

// =============================================================================
// Batch import
// =============================================================================

/// Number of decoded events handed to the sink in a single `add` call.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Minimum user-configurable batch size.
pub const MIN_BATCH_SIZE: usize = 1;

/// Maximum user-configurable batch size.
pub const MAX_BATCH_SIZE: usize = 50_000;

/// Maximum number of malformed-line warnings logged individually per file.
/// Further malformed lines are only counted.
pub const MAX_MALFORMED_LINE_WARNINGS: usize = 20;

// =============================================================================
// Live tail limits
// =============================================================================

/// How often the tail watcher polls the watched file for new content (ms).
pub const TAIL_POLL_INTERVAL_MS: u64 = 500;

/// How often the cancel flag is checked within each poll sleep interval (ms).
pub const TAIL_CANCEL_CHECK_INTERVAL_MS: u64 = 100;

/// Minimum user-configurable tail poll interval (ms).
pub const MIN_TAIL_POLL_INTERVAL_MS: u64 = 100;

/// Maximum user-configurable tail poll interval (ms).
pub const MAX_TAIL_POLL_INTERVAL_MS: u64 = 10_000;

/// Maximum bytes read from the tailed file in one poll tick.
pub const MAX_TAIL_READ_BYTES_PER_TICK: usize = 512 * 1_024; // 512 KiB

/// Maximum accumulated size of the partial (in-progress) line buffer.
/// A fragment larger than this is discarded with a warning.
pub const MAX_TAIL_PARTIAL_BYTES: usize = MAX_TAIL_READ_BYTES_PER_TICK * 4; // 2 MiB

// =============================================================================
// Filters
// =============================================================================

/// Name of the thread identity filter as shown in the filter chain.
pub const THREAD_FILTER_NAME: &str = "Thread Filter";

/// Description of the thread identity filter.
pub const THREAD_FILTER_DESCRIPTION: &str = "Filtering events based on a thread.";

/// Name of the minimum-level filter.
pub const LEVEL_FILTER_NAME: &str = "Level Filter";

/// Description of the minimum-level filter.
pub const LEVEL_FILTER_DESCRIPTION: &str = "Filtering events below a severity level.";

/// Name of the message substring filter.
pub const TEXT_FILTER_NAME: &str = "Text Filter";

/// Description of the message substring filter.
pub const TEXT_FILTER_DESCRIPTION: &str = "Filtering events whose message contains a string.";

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Maximum length of an event message included in debug output.
pub const DEBUG_MAX_LINE_PREVIEW: usize = 200;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";
