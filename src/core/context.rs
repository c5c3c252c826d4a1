// LogSift - core/context.rs
//
// Processing context: the provenance token threaded through every dispatch
// call. Created once per producer session, shared by `Arc`, never mutated.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Process-wide session counter. Only ever incremented.
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// How the producer of a session delivers events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessingMode {
    /// One-shot import of a finite source.
    Batch,
    /// Continuous tail of a growing source.
    Live,
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingMode::Batch => f.write_str("batch"),
            ProcessingMode::Live => f.write_str("live"),
        }
    }
}

/// Immutable identity of one processing session.
///
/// The sink treats it as opaque; listeners use it to tell a batch import of
/// a file apart from a live tail of the same file.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingContext {
    session_id: u64,
    mode: ProcessingMode,
    source: String,
    started_at: DateTime<Utc>,
    labels: BTreeMap<String, String>,
}

impl ProcessingContext {
    /// Start building a context for a batch import of `source`.
    pub fn batch(source: impl Into<String>) -> ContextBuilder {
        ContextBuilder::new(ProcessingMode::Batch, source.into())
    }

    /// Start building a context for a live tail of `source`.
    pub fn live(source: impl Into<String>) -> ContextBuilder {
        ContextBuilder::new(ProcessingMode::Live, source.into())
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    pub fn is_live(&self) -> bool {
        self.mode == ProcessingMode::Live
    }

    /// Source identity (file path, process name, ...).
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Free-form label fixed at construction time.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

impl fmt::Display for ProcessingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} '{}'", self.session_id, self.mode, self.source)
    }
}

/// Builder for `ProcessingContext`. Labels can only be attached here;
/// `build` freezes the context.
#[derive(Debug)]
pub struct ContextBuilder {
    mode: ProcessingMode,
    source: String,
    labels: BTreeMap<String, String>,
}

impl ContextBuilder {
    fn new(mode: ProcessingMode, source: String) -> Self {
        Self {
            mode,
            source,
            labels: BTreeMap::new(),
        }
    }

    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Assign a fresh session ID and freeze the context.
    pub fn build(self) -> Arc<ProcessingContext> {
        Arc::new(ProcessingContext {
            session_id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            mode: self.mode,
            source: self.source,
            started_at: Utc::now(),
            labels: self.labels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_are_unique_and_increasing() {
        let a = ProcessingContext::batch("a.jsonl").build();
        let b = ProcessingContext::live("a.jsonl").build();
        assert!(b.session_id() > a.session_id());
        assert_ne!(a, b);
    }

    #[test]
    fn test_mode_and_labels() {
        let ctx = ProcessingContext::live("app.jsonl")
            .label("host", "db-01")
            .build();
        assert!(ctx.is_live());
        assert_eq!(ctx.source(), "app.jsonl");
        assert_eq!(ctx.label("host"), Some("db-01"));
        assert_eq!(ctx.label("missing"), None);
    }

    #[test]
    fn test_display_names_session_mode_and_source() {
        let ctx = ProcessingContext::batch("x.jsonl").build();
        let shown = ctx.to_string();
        assert!(shown.contains("batch"));
        assert!(shown.contains("x.jsonl"));
    }
}
