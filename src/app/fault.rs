// LogSift - app/fault.rs
//
// Fault barrier: makes worker-thread death visible.
//
// Workers are started through `FaultBarrier::spawn`, which names the thread
// and routes an `Err` return or a panic escaping the work closure to the
// diagnostics channel. Threads started any other way are covered by the
// optional process-wide panic hook. Nothing is retried or restarted: a
// dead worker stays dead, it is just never silent.

use crate::core::diagnostics::{
    panic_message, panic_is_absorbed, Diagnostics, Fault, FaultOrigin,
};
use crate::util::error::{LogSiftError, Result};
use std::cell::Cell;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

thread_local! {
    /// True on threads started through `FaultBarrier::spawn`. The panic hook
    /// skips these so a panic is reported once, by the barrier.
    static GUARDED: Cell<bool> = const { Cell::new(false) };
}

/// Logs faults that escape worker threads.
#[derive(Clone)]
pub struct FaultBarrier {
    diagnostics: Arc<dyn Diagnostics>,
}

impl FaultBarrier {
    pub fn new(diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self { diagnostics }
    }

    /// Record that `thread_name` died with `error`. No recovery is attempted.
    pub fn on_uncaught(&self, thread_name: &str, error: &dyn fmt::Display) {
        self.diagnostics.severe(Fault {
            origin: FaultOrigin::Thread {
                name: thread_name.to_string(),
            },
            message: format!("Error in thread {thread_name}: {error}"),
        });
    }

    /// Spawn a named worker whose failure is reported instead of lost.
    ///
    /// Fails only if the OS refuses to create the thread.
    pub fn spawn<F>(&self, name: impl Into<String>, work: F) -> io::Result<JoinHandle<()>>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let name = name.into();
        let barrier = self.clone();
        let thread_name = name.clone();

        thread::Builder::new().name(name).spawn(move || {
            GUARDED.with(|g| g.set(true));
            match panic::catch_unwind(AssertUnwindSafe(work)) {
                Ok(Ok(())) => {
                    tracing::debug!(thread = %thread_name, "Worker finished");
                }
                Ok(Err(e)) => barrier.on_uncaught(&thread_name, &e),
                Err(payload) => barrier.on_uncaught(
                    &thread_name,
                    &LogSiftError::Panic {
                        message: panic_message(payload.as_ref()),
                    },
                ),
            }
        })
    }

    /// Install a process-wide panic hook reporting panics on threads not
    /// started through `spawn`. Panics the event sink absorbs are skipped:
    /// their thread keeps running. The previous hook still runs afterwards.
    pub fn install_panic_hook(&self) {
        let barrier = self.clone();
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !GUARDED.with(|g| g.get()) && !panic_is_absorbed() {
                let current = thread::current();
                let name = current.name().unwrap_or("<unnamed>");
                let location = info
                    .location()
                    .map(|l| format!(" at {}:{}", l.file(), l.line()))
                    .unwrap_or_default();
                let message = format!("panicked: {}{location}", panic_message(info.payload()));
                barrier.on_uncaught(name, &message);
            }
            previous(info);
        }));
        tracing::debug!("Fault barrier panic hook installed");
    }
}

impl fmt::Debug for FaultBarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultBarrier").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::diagnostics::MemoryDiagnostics;
    use crate::util::error::FilterError;

    fn barrier() -> (FaultBarrier, Arc<MemoryDiagnostics>) {
        let diag = Arc::new(MemoryDiagnostics::new());
        (FaultBarrier::new(diag.clone()), diag)
    }

    #[test]
    fn test_on_uncaught_names_thread_and_error() {
        let (barrier, diag) = barrier();
        barrier.on_uncaught("tail-1", &"disk unplugged");
        let faults = diag.faults();
        assert_eq!(faults.len(), 1);
        assert_eq!(
            faults[0].origin,
            FaultOrigin::Thread {
                name: "tail-1".to_string()
            }
        );
        assert!(faults[0].message.contains("tail-1"));
        assert!(faults[0].message.contains("disk unplugged"));
    }

    #[test]
    fn test_clean_worker_reports_nothing() {
        let (barrier, diag) = barrier();
        barrier.spawn("ok-worker", || Ok(())).unwrap().join().unwrap();
        assert!(diag.is_empty());
    }

    #[test]
    fn test_worker_error_is_reported_once() {
        let (barrier, diag) = barrier();
        barrier
            .spawn("err-worker", || {
                Err(FilterError::UnknownFilter {
                    name: "x".to_string(),
                }
                .into())
            })
            .unwrap()
            .join()
            .unwrap();

        let faults = diag.faults();
        assert_eq!(faults.len(), 1);
        assert!(faults[0].message.contains("err-worker"));
        assert!(faults[0].message.contains("No filter named 'x'"));
    }

    #[test]
    fn test_worker_panic_is_reported_and_join_succeeds() {
        let (barrier, diag) = barrier();
        let handle = barrier
            .spawn("panic-worker", || panic!("malformed event"))
            .unwrap();

        // The panic is absorbed inside the worker, so join is clean.
        assert!(handle.join().is_ok());
        let faults = diag.faults();
        assert_eq!(faults.len(), 1);
        assert!(faults[0].message.contains("malformed event"));
    }
}
