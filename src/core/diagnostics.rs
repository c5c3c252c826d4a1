// LogSift - core/diagnostics.rs
//
// The diagnostics channel. Components that absorb failures (the event sink,
// the fault barrier) report them here instead of to a global logger; the
// channel is injected at construction.

use parking_lot::Mutex;
use std::cell::Cell;
use std::panic::{self, UnwindSafe};

thread_local! {
    /// True while this thread runs code whose panics are caught and reported
    /// by the caller. A process-wide panic hook skips those panics.
    static ABSORBING: Cell<bool> = const { Cell::new(false) };
}

/// Where an absorbed failure happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultOrigin {
    /// A listener failed on one event of a processing session.
    Event { session: String, row: usize },
    /// A fault escaped a worker thread.
    Thread { name: String },
}

/// One severe-level diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub origin: FaultOrigin,
    pub message: String,
}

/// Sink for severe diagnostics.
pub trait Diagnostics: Send + Sync {
    fn severe(&self, fault: Fault);
}

/// Forwards diagnostics to `tracing` at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn severe(&self, fault: Fault) {
        match fault.origin {
            FaultOrigin::Event { session, row } => {
                tracing::error!(
                    session = %session,
                    index = row,
                    error = %fault.message,
                    "Error processing log event"
                );
            }
            FaultOrigin::Thread { name } => {
                tracing::error!(thread = %name, error = %fault.message, "Error in thread");
            }
        }
    }
}

/// Keeps every diagnostic in memory. Used by tests and by the CLI summary.
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    faults: Mutex<Vec<Fault>>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all diagnostics recorded so far, in arrival order.
    pub fn faults(&self) -> Vec<Fault> {
        self.faults.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.faults.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.faults.lock().is_empty()
    }
}

impl Diagnostics for MemoryDiagnostics {
    fn severe(&self, fault: Fault) {
        self.faults.lock().push(fault);
    }
}

/// Fans one diagnostic out to several channels.
pub struct TeeDiagnostics {
    targets: Vec<std::sync::Arc<dyn Diagnostics>>,
}

impl TeeDiagnostics {
    pub fn new(targets: Vec<std::sync::Arc<dyn Diagnostics>>) -> Self {
        Self { targets }
    }
}

impl Diagnostics for TeeDiagnostics {
    fn severe(&self, fault: Fault) {
        for target in &self.targets {
            target.severe(fault.clone());
        }
    }
}

/// Run `f`, catching a panic that the caller will report itself.
///
/// Panics raised inside are marked absorbed for `panic_is_absorbed`, so the
/// panic hook does not report the same failure again as a thread death.
pub fn catch_absorbed<F, R>(f: F) -> std::thread::Result<R>
where
    F: FnOnce() -> R + UnwindSafe,
{
    let previous = ABSORBING.with(|a| a.replace(true));
    let outcome = panic::catch_unwind(f);
    ABSORBING.with(|a| a.set(previous));
    outcome
}

/// True if a panic on the current thread will be caught by `catch_absorbed`.
pub fn panic_is_absorbed() -> bool {
    ABSORBING.with(|a| a.get())
}

/// Text of a panic payload (`&str` or `String` payloads; anything else is opaque).
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_memory_diagnostics_records_in_order() {
        let diag = MemoryDiagnostics::new();
        assert!(diag.is_empty());
        for n in 0..3 {
            diag.severe(Fault {
                origin: FaultOrigin::Thread {
                    name: format!("t{n}"),
                },
                message: "x".to_string(),
            });
        }
        let names: Vec<_> = diag
            .faults()
            .into_iter()
            .map(|f| match f.origin {
                FaultOrigin::Thread { name } => name,
                other => panic!("unexpected origin {other:?}"),
            })
            .collect();
        assert_eq!(names, vec!["t0", "t1", "t2"]);
    }

    #[test]
    fn test_tee_reaches_every_target() {
        let a = Arc::new(MemoryDiagnostics::new());
        let b = Arc::new(MemoryDiagnostics::new());
        let tee = TeeDiagnostics::new(vec![a.clone() as Arc<dyn Diagnostics>, b.clone()]);
        tee.severe(Fault {
            origin: FaultOrigin::Event {
                session: "#1".to_string(),
                row: 0,
            },
            message: "bad".to_string(),
        });
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn test_catch_absorbed_marks_only_its_own_scope() {
        assert!(!panic_is_absorbed());
        let inside = catch_absorbed(panic_is_absorbed).unwrap();
        assert!(inside);

        let nested = catch_absorbed(|| {
            let _ = catch_absorbed(|| panic!("inner"));
            panic_is_absorbed()
        })
        .unwrap();
        assert!(nested, "inner scope must restore the outer flag");

        assert!(catch_absorbed(|| panic!("outer")).is_err());
        assert!(!panic_is_absorbed());
    }

    #[test]
    fn test_panic_message_extracts_str_and_string() {
        let p: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(p.as_ref()), "static");
        let p: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(p.as_ref()), "owned");
        let p: Box<dyn std::any::Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(p.as_ref()), "non-string panic payload");
    }
}
