// LogSift - app/tail.rs
//
// Live tail: watches event files for lines appended after a starting offset
// and dispatches them to a collector in real time.
//
// Architecture:
//   - `TailManager` lives on the controlling thread; `run_tail_watcher` runs
//     on a fault-barrier worker polling each file on a fixed interval.
//   - Each watched file gets its own live processing context, built when
//     the tail starts.
//   - Decoded events go straight to the collector (usually an `EventSink`).
//     Status messages (`TailProgress`) go over an mpsc channel which the
//     controlling thread drains with `poll_progress`.
//   - An `Arc<AtomicBool>` cancel flag stops the worker.
//
// Error policy:
//   - Stat/read errors on a single file are non-fatal: logged as warnings,
//     a `FileError` message is sent, and the watcher moves on.
//   - Truncated/rotated files (size < last offset) reset the offset to 0.
//   - The poll loop sleeps in small slices so cancel is noticed within
//     TAIL_CANCEL_CHECK_INTERVAL_MS.
//   - MAX_TAIL_READ_BYTES_PER_TICK caps the bytes read per file per tick and
//     MAX_TAIL_PARTIAL_BYTES caps an unterminated line fragment.

use crate::app::batch::LineDecoder;
use crate::app::fault::FaultBarrier;
use crate::core::context::ProcessingContext;
use crate::core::sink::EventCollector;
use crate::util::constants::{
    MAX_TAIL_PARTIAL_BYTES, MAX_TAIL_READ_BYTES_PER_TICK, TAIL_CANCEL_CHECK_INTERVAL_MS,
};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

// =============================================================================
// Public types
// =============================================================================

/// A file to watch and where to start reading it.
#[derive(Debug, Clone)]
pub struct TailFile {
    pub path: PathBuf,
    /// Byte offset to resume from. `None` starts at the current end of file.
    pub start_offset: Option<u64>,
}

/// Status messages from the tail worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailProgress {
    /// The watcher is running.
    Started { file_count: usize },
    /// New events from `path` were dispatched to the collector.
    NewEvents { path: PathBuf, count: usize },
    /// A non-fatal error on one file.
    FileError { path: PathBuf, message: String },
    /// The watcher exited after a stop request.
    Stopped,
}

// =============================================================================
// TailManager
// =============================================================================

/// Manages a live tail operation on a background worker.
pub struct TailManager {
    /// Channel receiver for tail status messages.
    progress_rx: Option<mpsc::Receiver<TailProgress>>,
    /// Cancel flag shared with the background thread.
    cancel_flag: Option<Arc<AtomicBool>>,
}

impl TailManager {
    pub fn new() -> Self {
        Self {
            progress_rx: None,
            cancel_flag: None,
        }
    }

    /// Start tailing `files`, dispatching new events into `collector`.
    ///
    /// If a tail is already running it is stopped first.
    pub fn start_tail(
        &mut self,
        files: Vec<TailFile>,
        collector: Arc<dyn EventCollector>,
        poll_interval_ms: u64,
        barrier: &FaultBarrier,
    ) -> std::io::Result<()> {
        self.stop_tail();

        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let worker_cancel = Arc::clone(&cancel);

        let file_count = files.len();
        barrier.spawn("tail", move || {
            run_tail_watcher(files, collector, poll_interval_ms, tx, worker_cancel);
            Ok(())
        })?;

        self.progress_rx = Some(rx);
        self.cancel_flag = Some(cancel);
        tracing::info!(files = file_count, "Live tail started");
        Ok(())
    }

    /// Request the background tail worker to stop.
    ///
    /// The worker exits within `TAIL_CANCEL_CHECK_INTERVAL_MS`. Any messages
    /// still queued are discarded along with the receiver.
    pub fn stop_tail(&mut self) {
        if let Some(flag) = &self.cancel_flag {
            flag.store(true, Ordering::SeqCst);
            tracing::info!("Live tail stop requested");
        }
        self.cancel_flag = None;
        self.progress_rx = None;
    }

    /// Returns `true` if a tail worker is currently active.
    pub fn is_active(&self) -> bool {
        self.cancel_flag.is_some()
    }

    /// Drain all currently queued status messages without blocking.
    pub fn poll_progress(&self) -> Vec<TailProgress> {
        let mut messages = Vec::new();
        if let Some(ref rx) = self.progress_rx {
            while let Ok(msg) = rx.try_recv() {
                messages.push(msg);
            }
        }
        messages
    }
}

impl Default for TailManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TailManager {
    fn drop(&mut self) {
        self.stop_tail();
    }
}

// =============================================================================
// Per-file state (private to the background thread)
// =============================================================================

struct FileState {
    path: PathBuf,
    context: Arc<ProcessingContext>,
    /// Byte position just past the last byte read.
    offset: u64,
    /// Bytes after the final newline of the last read: an in-progress line.
    /// Kept undecoded so a character split across reads stays intact.
    partial: Vec<u8>,
    decoder: LineDecoder,
}

// =============================================================================
// Background tail watcher
// =============================================================================

fn run_tail_watcher(
    files: Vec<TailFile>,
    collector: Arc<dyn EventCollector>,
    poll_interval_ms: u64,
    tx: mpsc::Sender<TailProgress>,
    cancel: Arc<AtomicBool>,
) {
    macro_rules! send {
        ($msg:expr) => {
            if tx.send($msg).is_err() {
                // Controller dropped the receiver: stop quietly.
                return;
            }
        };
    }

    let mut states: Vec<FileState> = files
        .into_iter()
        .map(|file| {
            let offset = file.start_offset.unwrap_or_else(|| {
                std::fs::metadata(&file.path).map(|m| m.len()).unwrap_or(0)
            });
            tracing::debug!(file = %file.path.display(), offset, "Tail: initial offset");
            FileState {
                context: ProcessingContext::live(file.path.display().to_string()).build(),
                path: file.path,
                offset,
                partial: Vec::new(),
                decoder: LineDecoder::new(),
            }
        })
        .collect();

    send!(TailProgress::Started {
        file_count: states.len()
    });

    let slices = (poll_interval_ms / TAIL_CANCEL_CHECK_INTERVAL_MS).max(1);

    loop {
        for _ in 0..slices {
            std::thread::sleep(Duration::from_millis(TAIL_CANCEL_CHECK_INTERVAL_MS));
            if cancel.load(Ordering::SeqCst) {
                send!(TailProgress::Stopped);
                return;
            }
        }

        for state in &mut states {
            if cancel.load(Ordering::SeqCst) {
                send!(TailProgress::Stopped);
                return;
            }
            match poll_file(state, collector.as_ref()) {
                Ok(0) => {}
                Ok(count) => send!(TailProgress::NewEvents {
                    path: state.path.clone(),
                    count,
                }),
                Err(message) => send!(TailProgress::FileError {
                    path: state.path.clone(),
                    message,
                }),
            }
        }
    }
}

/// One poll of one file. Returns the number of events dispatched.
fn poll_file(state: &mut FileState, collector: &dyn EventCollector) -> Result<usize, String> {
    let current_size = std::fs::metadata(&state.path)
        .map(|m| m.len())
        .map_err(|e| {
            tracing::warn!(file = %state.path.display(), error = %e, "Tail: stat error");
            format!("Cannot stat: {e}")
        })?;

    if current_size < state.offset {
        tracing::info!(
            file = %state.path.display(),
            old_offset = state.offset,
            new_size = current_size,
            "Tail: file truncated or rotated, resetting offset to 0"
        );
        state.offset = 0;
        state.partial.clear();
    }

    if current_size == state.offset {
        return Ok(0);
    }

    let available = (current_size - state.offset) as usize;
    let new_bytes = read_bytes_at(&state.path, state.offset, available.min(MAX_TAIL_READ_BYTES_PER_TICK))
        .map_err(|e| {
            tracing::warn!(file = %state.path.display(), error = %e, "Tail: read error");
            format!("Read error: {e}")
        })?;
    if new_bytes.is_empty() {
        return Ok(0);
    }
    state.offset += new_bytes.len() as u64;
    state.partial.extend_from_slice(&new_bytes);

    // Everything up to the final newline is complete; the rest waits.
    let complete = match state.partial.iter().rposition(|&b| b == b'\n') {
        Some(nl) => {
            let rest = state.partial.split_off(nl + 1);
            std::mem::replace(&mut state.partial, rest)
        }
        None => {
            if state.partial.len() > MAX_TAIL_PARTIAL_BYTES {
                tracing::warn!(
                    file = %state.path.display(),
                    bytes = state.partial.len(),
                    "Tail: discarding oversized unterminated line"
                );
                state.partial.clear();
            }
            return Ok(0);
        }
    };

    let events = state.decoder.decode_all(&state.path, &complete);
    if events.is_empty() {
        return Ok(0);
    }
    tracing::debug!(
        file = %state.path.display(),
        count = events.len(),
        "Tail: new events"
    );
    collector.add(&events, &state.context);
    Ok(events.len())
}

/// Read up to `limit` bytes from `path` starting at byte `offset`.
fn read_bytes_at(path: &Path, offset: u64, limit: usize) -> std::io::Result<Vec<u8>> {
    let mut file = std::fs::File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::with_capacity(limit);
    file.take(limit as u64).read_to_end(&mut buf)?;
    Ok(buf)
}
