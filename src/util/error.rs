// LogSift - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// No string-based error propagation between subsystems.
// All errors preserve the causal chain for diagnostic logging.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all LogSift operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum LogSiftError {
    /// A listener failed while handling one event.
    Listener(ListenerError),

    /// Filter chain operation failed.
    Filter(FilterError),

    /// Reading an event source failed.
    Source(SourceError),

    /// Configuration loading or validation failed.
    Config(ConfigError),

    /// A worker thread panicked; carries the panic payload text.
    Panic { message: String },
}

impl fmt::Display for LogSiftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Listener(e) => write!(f, "Event processing error: {e}"),
            Self::Filter(e) => write!(f, "Filter error: {e}"),
            Self::Source(e) => write!(f, "Event source error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Panic { message } => write!(f, "panicked: {message}"),
        }
    }
}

impl std::error::Error for LogSiftError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Listener(e) => Some(e),
            Self::Filter(e) => Some(e),
            Self::Source(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Panic { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Listener errors
// ---------------------------------------------------------------------------

/// Errors raised by an event listener while handling a single event.
///
/// These never reach the producer: the sink logs them and moves on.
#[derive(Debug)]
pub enum ListenerError {
    /// The listener refused the event.
    Rejected { reason: String },

    /// The receiving store is full.
    CapacityReached { max: usize },

    /// Any other failure, with its cause.
    Failed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for ListenerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { reason } => write!(f, "event rejected: {reason}"),
            Self::CapacityReached { max } => {
                write!(f, "event store is full ({max} events)")
            }
            Self::Failed { source } => write!(f, "{source}"),
        }
    }
}

impl std::error::Error for ListenerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Failed { source } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<ListenerError> for LogSiftError {
    fn from(e: ListenerError) -> Self {
        Self::Listener(e)
    }
}

// ---------------------------------------------------------------------------
// Filter errors
// ---------------------------------------------------------------------------

/// Errors related to filter chain operations.
#[derive(Debug)]
pub enum FilterError {
    /// No filter with this name is registered in the chain.
    UnknownFilter { name: String },
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownFilter { name } => write!(f, "No filter named '{name}'"),
        }
    }
}

impl std::error::Error for FilterError {}

impl From<FilterError> for LogSiftError {
    fn from(e: FilterError) -> Self {
        Self::Filter(e)
    }
}

// ---------------------------------------------------------------------------
// Source errors
// ---------------------------------------------------------------------------

/// Errors related to reading an event source file.
#[derive(Debug)]
pub enum SourceError {
    /// The source file could not be opened.
    Open { path: PathBuf, source: io::Error },

    /// I/O error while reading an opened source.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, source } => {
                write!(f, "Cannot open '{}': {source}", path.display())
            }
            Self::Io { path, source } => {
                write!(f, "'{}': I/O error: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
        }
    }
}

impl From<SourceError> for LogSiftError {
    fn from(e: SourceError) -> Self {
        Self::Source(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML parsing failed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A config value is out of the allowed range.
    ValueOutOfRange {
        field: String,
        value: String,
        expected: String,
    },

    /// I/O error reading config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Config parse error '{}': {source}", path.display())
            }
            Self::ValueOutOfRange {
                field,
                value,
                expected,
            } => write!(
                f,
                "Config '{field}' = '{value}' is out of range. Expected: {expected}"
            ),
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for LogSiftError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Convenience type alias for LogSift results.
pub type Result<T> = std::result::Result<T, LogSiftError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_listener_failure_preserves_source_chain() {
        let inner = io::Error::new(io::ErrorKind::Other, "disk gone");
        let err: LogSiftError = ListenerError::Failed {
            source: Box::new(inner),
        }
        .into();

        assert_eq!(err.to_string(), "Event processing error: disk gone");
        let listener = err.source().expect("top-level error must expose its cause");
        assert!(listener.source().is_some());
    }

    #[test]
    fn test_config_out_of_range_message_is_actionable() {
        let err = ConfigError::ValueOutOfRange {
            field: "[tail] poll_interval_ms".to_string(),
            value: "5".to_string(),
            expected: "100-10000".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("poll_interval_ms"));
        assert!(msg.contains("100-10000"));
    }
}
