// LogSift - app/pipeline.rs
//
// Wires the pipeline together: event store (the dataset), the streaming
// sink feeding it, the filter chain with the built-in filters, and the fault
// barrier for producer workers.
//
// The view layer talks to this object only: it hands producers `sink()`,
// asks `visible_rows()` on redraw, and drives the filters through their
// handles. It keeps no filtering state of its own.

use crate::app::batch::{BatchImport, BatchReport};
use crate::app::fault::FaultBarrier;
use crate::app::tail::{TailFile, TailManager};
use crate::core::diagnostics::Diagnostics;
use crate::core::filter::{FilterChain, LevelFilter, LogFilter, TextFilter};
use crate::core::model::{Level, LogEvent};
use crate::core::sink::{EventCollector, EventSink};
use crate::core::store::EventStore;
use crate::core::thread_filter::ThreadIdentityFilter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Filter setup requested by a front end, applied in one step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSettings {
    /// Enable the thread filter even with no threads or search given.
    pub thread_filter: bool,
    pub threads: Vec<String>,
    pub search: Option<String>,
    /// Invert the selection after the search is applied.
    pub invert: bool,
    pub min_level: Option<Level>,
    pub contains: Option<String>,
}

impl FilterSettings {
    fn wants_thread_filter(&self) -> bool {
        self.thread_filter || !self.threads.is_empty() || self.search.is_some() || self.invert
    }
}

/// The assembled event pipeline.
pub struct Pipeline {
    store: Arc<EventStore>,
    sink: Arc<EventSink>,
    chain: FilterChain,
    threads: Arc<ThreadIdentityFilter>,
    levels: Arc<LevelFilter>,
    text: Arc<TextFilter>,
    barrier: FaultBarrier,
    /// Set by the chain's change listener; cleared by `take_changed`.
    changed: Arc<AtomicBool>,
}

impl Pipeline {
    /// Build a pipeline whose store holds at most `max_events` rows.
    ///
    /// All filters start disabled. `diagnostics` receives both per-event
    /// dispatch failures and worker-thread faults.
    pub fn new(max_events: usize, diagnostics: Arc<dyn Diagnostics>) -> Self {
        let store = Arc::new(EventStore::new(max_events));
        let sink = Arc::new(EventSink::new(store.clone(), diagnostics.clone()));
        let barrier = FaultBarrier::new(diagnostics);

        let threads = Arc::new(ThreadIdentityFilter::new(store.clone()));
        let levels = Arc::new(LevelFilter::new(Level::Unknown));
        let text = Arc::new(TextFilter::new(""));

        let changed = Arc::new(AtomicBool::new(false));
        let flag = changed.clone();
        let mut chain = FilterChain::new();
        chain.set_change_listener(Arc::new(move |name: &str| {
            tracing::trace!(filter = name, "Filter changed");
            flag.store(true, Ordering::Release);
        }));
        chain.add(threads.clone());
        chain.add(levels.clone());
        chain.add(text.clone());

        Self {
            store,
            sink,
            chain,
            threads,
            levels,
            text,
            barrier,
            changed,
        }
    }

    /// The ingestion endpoint to hand to producers.
    pub fn sink(&self) -> Arc<dyn EventCollector> {
        self.sink.clone()
    }

    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    pub fn chain(&self) -> &FilterChain {
        &self.chain
    }

    pub fn threads(&self) -> &Arc<ThreadIdentityFilter> {
        &self.threads
    }

    pub fn levels(&self) -> &Arc<LevelFilter> {
        &self.levels
    }

    pub fn text(&self) -> &Arc<TextFilter> {
        &self.text
    }

    pub fn barrier(&self) -> &FaultBarrier {
        &self.barrier
    }

    /// Import a file on a worker and wait for it.
    pub fn import(&self, path: PathBuf, batch_size: usize) -> std::io::Result<Option<BatchReport>> {
        let import = BatchImport::start(path, self.sink(), batch_size, &self.barrier)?;
        Ok(import.wait())
    }

    /// Start tailing `path` from `start_offset` (or its current end).
    pub fn follow(
        &self,
        tail: &mut TailManager,
        path: PathBuf,
        start_offset: Option<u64>,
        poll_interval_ms: u64,
    ) -> std::io::Result<()> {
        tail.start_tail(
            vec![TailFile { path, start_offset }],
            self.sink(),
            poll_interval_ms,
            &self.barrier,
        )
    }

    /// Apply `settings` to the built-in filters, in the order a user would:
    /// enable (reloading threads), select, search, invert.
    pub fn configure(&self, settings: &FilterSettings) {
        if settings.wants_thread_filter() {
            self.threads.set_enabled(true);
            self.threads.select(settings.threads.iter().cloned());
            if let Some(ref prefix) = settings.search {
                self.threads.set_search(prefix);
            }
            if settings.invert {
                self.threads.invert_selection();
            }
            tracing::debug!(
                selected = self.threads.selection().len(),
                universe = self.threads.universe().len(),
                "Thread filter configured"
            );
        }

        if let Some(level) = settings.min_level {
            self.levels.set_min_level(level);
            self.levels.set_enabled(true);
        }

        if let Some(ref text) = settings.contains {
            self.text.set_text(text);
            self.text.set_enabled(true);
        }
    }

    /// Row indices of the events every enabled filter accepts.
    pub fn visible_rows(&self) -> Vec<usize> {
        self.store.with_events(|events| self.chain.visible_rows(events))
    }

    /// Visible rows at or after `start`, with their row indices.
    pub fn visible_since(&self, start: usize) -> Vec<(usize, LogEvent)> {
        self.store
            .since(start)
            .into_iter()
            .enumerate()
            .map(|(offset, event)| (start + offset, event))
            .filter(|(row, event)| self.chain.is_row_visible(event, *row))
            .collect()
    }

    /// True if any filter changed since the last call.
    pub fn take_changed(&self) -> bool {
        self.changed.swap(false, Ordering::AcqRel)
    }
}
