// LogSift - core/model.rs
//
// Core data model types. Pure data definitions with no I/O and no
// platform dependencies.
//
// These types are the shared vocabulary across all layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Log Event (structured output of the external parser)
// =============================================================================

/// A single parsed log event.
///
/// This is the unit that flows through dispatch, filtering and display.
/// Events have no intrinsic key: identity is the row index within the
/// dataset that owns them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Name or ID of the thread that emitted the event. Empty if unknown.
    #[serde(default)]
    pub thread: String,

    /// Event timestamp in UTC, if the source carried one.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    /// Normalised severity level.
    #[serde(default, deserialize_with = "deserialize_level")]
    pub level: Level,

    /// Logger or component name (format-dependent).
    #[serde(default)]
    pub logger: Option<String>,

    /// Full message text.
    pub message: String,
}

impl LogEvent {
    /// Convenience constructor for an event with only a thread and a message.
    pub fn new(thread: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            thread: thread.into(),
            timestamp: None,
            level: Level::Unknown,
            logger: None,
            message: message.into(),
        }
    }

    /// Builder-style level setter.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}

// =============================================================================
// Level
// =============================================================================

/// Normalised severity levels, ordered from least to most severe.
///
/// `Unknown` sorts below everything so a minimum-level filter hides it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum Level {
    #[default]
    Unknown,
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl Level {
    /// Human-readable label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Level::Fatal => "Fatal",
            Level::Error => "Error",
            Level::Warning => "Warning",
            Level::Info => "Info",
            Level::Debug => "Debug",
            Level::Trace => "Trace",
            Level::Unknown => "Unknown",
        }
    }

    /// Short label for compact display (e.g. table columns).
    pub fn short_label(&self) -> &'static str {
        match self {
            Level::Fatal => "FATAL",
            Level::Error => "ERROR",
            Level::Warning => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
            Level::Unknown => "?????",
        }
    }

    /// Map a raw level string to a `Level`, case-insensitively.
    ///
    /// Accepts the common spellings of log4j, java.util.logging, syslog and
    /// .NET loggers. Anything unrecognised maps to `Unknown`.
    pub fn parse(raw: &str) -> Level {
        match raw.trim().to_lowercase().as_str() {
            "fatal" | "critical" | "crit" | "emerg" | "alert" => Level::Fatal,
            "error" | "err" | "severe" => Level::Error,
            "warning" | "warn" => Level::Warning,
            "info" | "information" | "notice" | "config" => Level::Info,
            "debug" | "dbg" | "fine" => Level::Debug,
            "trace" | "finer" | "finest" | "verbose" => Level::Trace,
            _ => Level::Unknown,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Lenient level decoding: event files spell levels many ways, and an
/// unrecognised level must not make the whole line malformed.
fn deserialize_level<'de, D>(deserializer: D) -> Result<Level, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().map(Level::parse).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parse_common_spellings() {
        assert_eq!(Level::parse("WARN"), Level::Warning);
        assert_eq!(Level::parse("Severe"), Level::Error);
        assert_eq!(Level::parse(" fine "), Level::Debug);
        assert_eq!(Level::parse("bogus"), Level::Unknown);
    }

    #[test]
    fn test_level_ordering_unknown_is_lowest() {
        assert!(Level::Unknown < Level::Trace);
        assert!(Level::Warning < Level::Error);
        assert!(Level::Error < Level::Fatal);
    }

    #[test]
    fn test_event_deserialises_sparse_json() {
        let event: LogEvent = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert_eq!(event.thread, "");
        assert_eq!(event.level, Level::Unknown);
        assert!(event.timestamp.is_none());
    }

    #[test]
    fn test_event_deserialises_full_json() {
        let line = r#"{"thread":"worker-1","level":"ERR","timestamp":"2024-03-01T10:00:00Z","logger":"db","message":"boom"}"#;
        let event: LogEvent = serde_json::from_str(line).unwrap();
        assert_eq!(event.thread, "worker-1");
        assert_eq!(event.level, Level::Error);
        assert_eq!(event.logger.as_deref(), Some("db"));
        assert!(event.timestamp.is_some());
    }

    #[test]
    fn test_event_without_message_is_rejected() {
        let result: Result<LogEvent, _> = serde_json::from_str(r#"{"thread":"main"}"#);
        assert!(result.is_err());
    }
}
