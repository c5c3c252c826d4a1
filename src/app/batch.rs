// LogSift - app/batch.rs
//
// Batch import: reads a JSON-lines event file on a worker thread and feeds
// it to a collector in fixed-size batches under one batch processing context.
//
// Error policy:
//   - A file that cannot be opened or read fails the worker; the fault
//     barrier reports it.
//   - A malformed or blank line is skipped. Malformed lines (bad JSON or
//     bad UTF-8) are counted and the first MAX_MALFORMED_LINE_WARNINGS are
//     logged individually.
//   - A trailing line with no newline is still imported (the file is
//     finished), but `bytes_consumed` stops before it so a tail started
//     afterwards re-reads it once complete.

use crate::app::fault::FaultBarrier;
use crate::core::context::ProcessingContext;
use crate::core::model::LogEvent;
use crate::core::sink::EventCollector;
use crate::util::constants::MAX_MALFORMED_LINE_WARNINGS;
use crate::util::error::SourceError;
use crate::util::logging::preview;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

/// Outcome of one batch import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub session_id: u64,
    /// Non-blank lines read.
    pub lines: usize,
    /// Events handed to the collector.
    pub delivered: usize,
    /// Lines that did not decode as an event.
    pub malformed: usize,
    /// Byte offset just past the last newline-terminated line.
    pub bytes_consumed: u64,
}

/// Decodes event lines and keeps the malformed-line count.
#[derive(Debug, Default)]
pub struct LineDecoder {
    malformed: usize,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn malformed(&self) -> usize {
        self.malformed
    }

    /// Decode one line. Blank lines yield `None` without counting as malformed.
    pub fn decode(&mut self, source: &Path, line: &str) -> Option<LogEvent> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        match serde_json::from_str::<LogEvent>(trimmed) {
            Ok(event) => Some(event),
            Err(e) => {
                self.reject(source, &e, trimmed);
                None
            }
        }
    }

    /// Decode one raw line. Invalid UTF-8 counts as malformed.
    pub fn decode_bytes(&mut self, source: &Path, bytes: &[u8]) -> Option<LogEvent> {
        match std::str::from_utf8(bytes) {
            Ok(line) => self.decode(source, line),
            Err(e) => {
                self.reject(source, &e, &String::from_utf8_lossy(bytes));
                None
            }
        }
    }

    /// Decode every line of `bytes`, which must end at a line boundary.
    pub fn decode_all(&mut self, source: &Path, bytes: &[u8]) -> Vec<LogEvent> {
        bytes
            .split(|&b| b == b'\n')
            .filter_map(|line| self.decode_bytes(source, line))
            .collect()
    }

    fn reject(&mut self, source: &Path, error: &dyn fmt::Display, line: &str) {
        self.malformed += 1;
        if self.malformed <= MAX_MALFORMED_LINE_WARNINGS {
            tracing::warn!(
                file = %source.display(),
                error = %error,
                line = preview(line.trim()),
                "Skipping malformed event line"
            );
        }
    }
}

/// Import `path` into `collector` on the calling thread.
pub fn import_file(
    path: &Path,
    collector: &dyn EventCollector,
    batch_size: usize,
) -> Result<BatchReport, SourceError> {
    let file = File::open(path).map_err(|source| SourceError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    import_reader(path, BufReader::new(file), collector, batch_size)
}

/// Import from any buffered reader; `path` names the source in diagnostics.
pub fn import_reader<R: BufRead>(
    path: &Path,
    mut reader: R,
    collector: &dyn EventCollector,
    batch_size: usize,
) -> Result<BatchReport, SourceError> {
    let context = ProcessingContext::batch(path.display().to_string()).build();
    let batch_size = batch_size.max(1);
    let mut decoder = LineDecoder::new();
    let mut batch: Vec<LogEvent> = Vec::with_capacity(batch_size);
    let mut report = BatchReport {
        session_id: context.session_id(),
        lines: 0,
        delivered: 0,
        malformed: 0,
        bytes_consumed: 0,
    };
    // Raw bytes: one bad line must not fail the whole read.
    let mut line: Vec<u8> = Vec::new();

    loop {
        line.clear();
        let n = reader
            .read_until(b'\n', &mut line)
            .map_err(|source| SourceError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        if n == 0 {
            break;
        }
        if line.last() == Some(&b'\n') {
            report.bytes_consumed += n as u64;
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        report.lines += 1;
        if let Some(event) = decoder.decode_bytes(path, &line) {
            batch.push(event);
            if batch.len() >= batch_size {
                report.delivered += batch.len();
                collector.add(&batch, &context);
                batch.clear();
            }
        }
    }

    if !batch.is_empty() {
        report.delivered += batch.len();
        collector.add(&batch, &context);
    }
    report.malformed = decoder.malformed();

    tracing::info!(
        session = %context,
        lines = report.lines,
        delivered = report.delivered,
        malformed = report.malformed,
        "Batch import complete"
    );
    Ok(report)
}

/// A batch import running on a fault-barrier worker.
pub struct BatchImport {
    handle: JoinHandle<()>,
    report_rx: mpsc::Receiver<BatchReport>,
}

impl BatchImport {
    /// Start importing `path` on a worker named after the file.
    pub fn start(
        path: PathBuf,
        collector: Arc<dyn EventCollector>,
        batch_size: usize,
        barrier: &FaultBarrier,
    ) -> io::Result<Self> {
        let (tx, report_rx) = mpsc::channel();
        let name = format!(
            "batch:{}",
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        );
        let handle = barrier.spawn(name, move || {
            let report = import_file(&path, collector.as_ref(), batch_size)?;
            // Receiver gone means nobody waits for the report.
            let _ = tx.send(report);
            Ok(())
        })?;
        Ok(Self { handle, report_rx })
    }

    /// Block until the import finishes. `None` if the worker failed; the
    /// failure has already been reported by the fault barrier.
    pub fn wait(self) -> Option<BatchReport> {
        if self.handle.join().is_err() {
            return None;
        }
        self.report_rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::diagnostics::MemoryDiagnostics;
    use crate::core::store::EventStore;
    use std::io::Cursor;

    const SAMPLE: &str = concat!(
        r#"{"thread":"main","level":"INFO","message":"starting"}"#,
        "\n",
        "\n",
        "not json at all\n",
        r#"{"thread":"worker-1","level":"WARN","message":"slow"}"#,
        "\n",
        r#"{"thread":"worker-2","message":"done"}"#,
    );

    #[test]
    fn test_import_skips_malformed_and_blank_lines() {
        let store = EventStore::new(100);
        let report = import_reader(
            Path::new("sample.jsonl"),
            Cursor::new(SAMPLE),
            &store,
            2,
        )
        .unwrap();

        assert_eq!(report.lines, 4);
        assert_eq!(report.delivered, 3);
        assert_eq!(report.malformed, 1);
        let threads: Vec<_> = store.get_all().into_iter().map(|e| e.thread).collect();
        assert_eq!(threads, vec!["main", "worker-1", "worker-2"]);
    }

    #[test]
    fn test_bytes_consumed_stops_before_unterminated_line() {
        let store = EventStore::new(100);
        let report =
            import_reader(Path::new("s"), Cursor::new(SAMPLE), &store, 10).unwrap();
        let last_newline = SAMPLE.rfind('\n').unwrap() as u64 + 1;
        assert_eq!(report.bytes_consumed, last_newline);
    }

    #[test]
    fn test_invalid_utf8_line_is_malformed_not_fatal() {
        let mut input = Vec::new();
        input.extend_from_slice(br#"{"thread":"main","message":"before"}"#);
        input.extend_from_slice(b"\n\xff\xfe garbage\n");
        input.extend_from_slice(br#"{"thread":"main","message":"after"}"#);
        input.push(b'\n');
        let store = EventStore::new(100);

        let report =
            import_reader(Path::new("bad.jsonl"), Cursor::new(input.clone()), &store, 1).unwrap();

        assert_eq!(report.lines, 3);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.malformed, 1);
        assert_eq!(report.bytes_consumed, input.len() as u64);
        let messages: Vec<_> = store.get_all().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["before", "after"]);
    }

    #[test]
    fn test_missing_file_is_open_error() {
        let store = EventStore::new(10);
        let err = import_file(Path::new("/nonexistent/logsift/events.jsonl"), &store, 10)
            .unwrap_err();
        assert!(matches!(err, SourceError::Open { .. }));
    }

    #[test]
    fn test_background_import_failure_goes_to_barrier() {
        let diag = Arc::new(MemoryDiagnostics::new());
        let barrier = FaultBarrier::new(diag.clone());
        let store = Arc::new(EventStore::new(10));

        let import = BatchImport::start(
            PathBuf::from("/nonexistent/logsift/events.jsonl"),
            store,
            10,
            &barrier,
        )
        .unwrap();

        assert!(import.wait().is_none());
        let faults = diag.faults();
        assert_eq!(faults.len(), 1);
        assert!(faults[0].message.contains("batch:events.jsonl"));
    }
}
