// LogSift - core/thread_filter.rs
//
// Thread identity filter: shows only events from a user-selected set of
// threads.
//
// State kept here:
//   - universe:  every distinct thread ID in the full dataset, ordered
//                case-insensitively (exact byte order breaks ties so IDs
//                differing only in case stay distinct).
//   - selection: the threads to match. Empty means "match everything".
//                Never holds a thread the search hides: narrowing the
//                search deselects what drops out of view.
//   - search:    incremental search text; drives the visible/hidden
//                partition of the universe. Matching is a case-sensitive
//                prefix test while ordering is case-insensitive; both are
//                intentional and kept apart.
//
// All three live behind one RwLock. Mutations take the write lock for their
// whole update; `matches` takes the read lock, so a row check never sees a
// half-applied reload.

use crate::core::filter::{FilterMeta, LogFilter};
use crate::core::model::LogEvent;
use crate::core::store::DatasetSource;
use crate::util::constants::{THREAD_FILTER_DESCRIPTION, THREAD_FILTER_NAME};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

/// Case-insensitive order with an exact tiebreak.
pub fn thread_order(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
        .then_with(|| a.cmp(b))
}

// =============================================================================
// Search partition
// =============================================================================

/// Split of the thread universe by the current search text.
///
/// Both halves keep universe order. Every universe entry is in exactly one
/// half. With an empty search text everything is visible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPartition {
    visible: Vec<String>,
    hidden: Vec<String>,
}

impl SearchPartition {
    fn build(universe: &[String], prefix: &str) -> Self {
        let (visible, hidden): (Vec<String>, Vec<String>) = universe
            .iter()
            .cloned()
            .partition(|id| id.starts_with(prefix));
        Self { visible, hidden }
    }

    /// Threads matching the search text.
    pub fn visible(&self) -> &[String] {
        &self.visible
    }

    /// Threads excluded by the search text.
    pub fn hidden(&self) -> &[String] {
        &self.hidden
    }
}

// =============================================================================
// Filter state
// =============================================================================

/// Logical phase of the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadFilterPhase {
    /// Disabled; every event passes.
    Inactive,
    /// Enabled, no search text.
    ActiveUnfiltered,
    /// Enabled with a non-empty search text.
    ActiveSearching,
}

#[derive(Debug, Default)]
struct ThreadState {
    universe: Vec<String>,
    selection: HashSet<String>,
    search: String,
    partition: SearchPartition,
}

impl ThreadState {
    fn rebuild_partition(&mut self) {
        self.partition = SearchPartition::build(&self.universe, &self.search);
    }

    /// Deselect threads the current search hides. Returns how many were
    /// dropped. IDs outside the universe are not hidden and stay.
    fn narrow_to_visible(&mut self) -> usize {
        let before = self.selection.len();
        let hidden = &self.partition.hidden;
        self.selection.retain(|id| {
            hidden
                .binary_search_by(|candidate| thread_order(candidate, id))
                .is_err()
        });
        before - self.selection.len()
    }

    fn in_universe(&self, id: &str) -> bool {
        self.universe
            .binary_search_by(|candidate| thread_order(candidate, id))
            .is_ok()
    }

    fn ordered_selection(&self) -> Vec<String> {
        let mut selected: Vec<String> = self.selection.iter().cloned().collect();
        selected.sort_by(|a, b| thread_order(a, b));
        selected
    }
}

/// Point-in-time copy of the filter state, for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadFilterSnapshot {
    pub universe: Vec<String>,
    /// Selected threads in universe order.
    pub selection: Vec<String>,
    pub search: String,
    pub partition: SearchPartition,
}

// =============================================================================
// ThreadIdentityFilter
// =============================================================================

pub struct ThreadIdentityFilter {
    meta: FilterMeta,
    dataset: Arc<dyn DatasetSource>,
    state: RwLock<ThreadState>,
}

impl ThreadIdentityFilter {
    /// Create a disabled filter that reloads from `dataset`.
    pub fn new(dataset: Arc<dyn DatasetSource>) -> Self {
        Self {
            meta: FilterMeta::new(THREAD_FILTER_NAME, THREAD_FILTER_DESCRIPTION),
            dataset,
            state: RwLock::new(ThreadState::default()),
        }
    }

    pub fn phase(&self) -> ThreadFilterPhase {
        if !self.is_enabled() {
            ThreadFilterPhase::Inactive
        } else if self.state.read().search.is_empty() {
            ThreadFilterPhase::ActiveUnfiltered
        } else {
            ThreadFilterPhase::ActiveSearching
        }
    }

    /// Resynchronise the universe from the full dataset.
    ///
    /// Blocking and O(dataset). Selected threads that no longer occur are
    /// dropped silently; the search text is kept and the partition rebuilt.
    pub fn reload(&self) {
        let events = self.dataset.all_events();

        let mut universe: Vec<String> = events
            .iter()
            .map(|e| e.thread.as_str())
            .collect::<HashSet<&str>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        universe.sort_by(|a, b| thread_order(a, b));

        let (threads, selected, dropped) = {
            let mut state = self.state.write();
            state.universe = universe;
            let before = state.selection.len();
            let state = &mut *state;
            let universe = &state.universe;
            state.selection.retain(|id| {
                universe
                    .binary_search_by(|candidate| thread_order(candidate, id))
                    .is_ok()
            });
            state.rebuild_partition();
            state.narrow_to_visible();
            (
                state.universe.len(),
                state.selection.len(),
                before - state.selection.len(),
            )
        };

        tracing::debug!(
            events = events.len(),
            threads,
            selected,
            dropped,
            "Thread universe reloaded"
        );
        self.meta().notify_changed();
    }

    /// The "reload threads" user action: reload and reset the search text.
    pub fn reload_threads(&self) {
        self.reload();
        self.set_search("");
    }

    /// Set the incremental search text and repartition the universe.
    ///
    /// Selected threads that the new search hides are deselected; the
    /// chain is notified only when that happens.
    pub fn set_search(&self, text: &str) {
        let deselected = {
            let mut state = self.state.write();
            if state.search == text {
                return;
            }
            state.search = text.to_string();
            state.rebuild_partition();
            let deselected = state.narrow_to_visible();
            tracing::trace!(
                search = text,
                visible = state.partition.visible.len(),
                hidden = state.partition.hidden.len(),
                deselected,
                "Thread search updated"
            );
            deselected
        };
        if deselected > 0 {
            self.meta().notify_changed();
        }
    }

    pub fn search(&self) -> String {
        self.state.read().search.clone()
    }

    /// Replace the selection with exactly `ids`. The universe is untouched;
    /// IDs outside it are kept until the next reload drops them.
    pub fn select<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let selection: HashSet<String> = ids.into_iter().map(Into::into).collect();
        {
            let mut state = self.state.write();
            let unknown = selection.iter().filter(|id| !state.in_universe(id)).count();
            if unknown > 0 {
                tracing::debug!(unknown, "Selected threads not present in the universe");
            }
            state.selection = selection;
        }
        self.meta().notify_changed();
    }

    /// Empty the selection: every event passes again.
    pub fn clear_selection(&self) {
        self.state.write().selection.clear();
        self.meta().notify_changed();
    }

    /// Select exactly the visible threads that are not selected now.
    ///
    /// Applying it twice with no search or dataset change in between
    /// restores the original selection.
    pub fn invert_selection(&self) {
        {
            let mut guard = self.state.write();
            let state = &mut *guard;
            let inverted: HashSet<String> = state
                .partition
                .visible
                .iter()
                .filter(|id| !state.selection.contains(*id))
                .cloned()
                .collect();
            state.selection = inverted;
        }
        self.meta().notify_changed();
    }

    /// Indices into the visible pool of the threads currently selected.
    pub fn selected_visible_indices(&self) -> Vec<usize> {
        let state = self.state.read();
        state
            .partition
            .visible
            .iter()
            .enumerate()
            .filter(|(_, id)| state.selection.contains(*id))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Select visible threads by index, as a list widget reports them.
    ///
    /// Replaces the whole selection; out-of-range indices are ignored.
    pub fn select_visible_indices(&self, indices: &[usize]) {
        {
            let mut guard = self.state.write();
            let state = &mut *guard;
            state.selection = indices
                .iter()
                .filter_map(|&idx| state.partition.visible.get(idx))
                .cloned()
                .collect();
        }
        self.meta().notify_changed();
    }

    /// Selected threads in universe order.
    pub fn selection(&self) -> Vec<String> {
        self.state.read().ordered_selection()
    }

    pub fn universe(&self) -> Vec<String> {
        self.state.read().universe.clone()
    }

    pub fn partition(&self) -> SearchPartition {
        self.state.read().partition.clone()
    }

    /// Consistent copy of the whole state under one read lock.
    pub fn snapshot(&self) -> ThreadFilterSnapshot {
        let state = self.state.read();
        ThreadFilterSnapshot {
            universe: state.universe.clone(),
            selection: state.ordered_selection(),
            search: state.search.clone(),
            partition: state.partition.clone(),
        }
    }
}

impl LogFilter for ThreadIdentityFilter {
    fn meta(&self) -> &FilterMeta {
        &self.meta
    }

    fn matches(&self, event: &LogEvent, _row: usize) -> bool {
        let state = self.state.read();
        state.selection.is_empty() || state.selection.contains(&event.thread)
    }

    fn activate(&self) {
        self.reload();
    }
}

impl std::fmt::Debug for ThreadIdentityFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadIdentityFilter")
            .field("meta", &self.meta)
            .field("state", &*self.state.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::ProcessingContext;
    use crate::core::sink::EventCollector;
    use crate::core::store::EventStore;

    fn store_with(threads: &[&str]) -> Arc<EventStore> {
        let store = Arc::new(EventStore::new(10_000));
        let events: Vec<LogEvent> = threads
            .iter()
            .enumerate()
            .map(|(n, t)| LogEvent::new(*t, format!("event {n}")))
            .collect();
        store.add(&events, &ProcessingContext::batch("test").build());
        store
    }

    fn enabled_filter(store: &Arc<EventStore>) -> ThreadIdentityFilter {
        let filter = ThreadIdentityFilter::new(store.clone());
        filter.set_enabled(true);
        filter
    }

    fn visible_threads(filter: &ThreadIdentityFilter, store: &EventStore) -> Vec<String> {
        store
            .get_all()
            .iter()
            .enumerate()
            .filter(|(row, e)| filter.accept(e, *row))
            .map(|(_, e)| e.thread.clone())
            .collect()
    }

    fn assert_partition_invariant(filter: &ThreadIdentityFilter) {
        let snap = filter.snapshot();
        let visible: HashSet<&String> = snap.partition.visible().iter().collect();
        let hidden: HashSet<&String> = snap.partition.hidden().iter().collect();
        let universe: HashSet<&String> = snap.universe.iter().collect();
        assert!(visible.is_disjoint(&hidden), "visible and hidden overlap");
        let union: HashSet<&String> = visible.union(&hidden).copied().collect();
        assert_eq!(union, universe);
        assert_eq!(
            snap.partition.visible().len() + snap.partition.hidden().len(),
            snap.universe.len(),
            "partition must not duplicate entries"
        );
    }

    /// Disabled filter passes everything regardless of selection.
    #[test]
    fn test_inactive_accepts_everything() {
        let store = store_with(&["main", "worker-1"]);
        let filter = ThreadIdentityFilter::new(store.clone());
        filter.select(["worker-1"]);
        assert_eq!(filter.phase(), ThreadFilterPhase::Inactive);
        assert_eq!(visible_threads(&filter, &store).len(), 2);
    }

    /// Empty selection is the match-everything sentinel.
    #[test]
    fn test_empty_selection_accepts_all() {
        let store = store_with(&["main", "worker-1", "worker-2", "main"]);
        let filter = enabled_filter(&store);
        assert!(filter.selection().is_empty());
        assert_eq!(visible_threads(&filter, &store).len(), 4);
    }

    /// The thread scenario end to end: enable, select, search, invert.
    #[test]
    fn test_select_search_invert_scenario() {
        let store = store_with(&["main", "worker-1", "worker-2"]);
        let filter = enabled_filter(&store);

        assert_eq!(filter.universe(), vec!["main", "worker-1", "worker-2"]);
        assert!(filter.selection().is_empty());
        assert_eq!(visible_threads(&filter, &store).len(), 3);

        filter.select(["worker-1"]);
        assert_eq!(visible_threads(&filter, &store), vec!["worker-1"]);

        filter.set_search("worker");
        assert_eq!(filter.phase(), ThreadFilterPhase::ActiveSearching);
        assert_eq!(filter.partition().visible(), ["worker-1", "worker-2"]);
        assert_eq!(filter.selected_visible_indices(), vec![0]);

        filter.invert_selection();
        assert_eq!(filter.selection(), vec!["worker-2"]);
        assert_eq!(visible_threads(&filter, &store), vec!["worker-2"]);
    }

    /// Reload drops selected threads that vanished from the dataset.
    #[test]
    fn test_reload_drops_stale_selection() {
        let store = store_with(&["main", "worker-1", "worker-2"]);
        let filter = enabled_filter(&store);
        filter.select(["worker-1", "ghost"]);

        filter.reload();

        assert_eq!(filter.selection(), vec!["worker-1"]);
    }

    /// Re-enabling after the dataset changed tolerates vanished selections.
    #[test]
    fn test_reenable_after_dataset_change() {
        let store = store_with(&["main", "worker-1"]);
        let filter = enabled_filter(&store);
        filter.select(["worker-1"]);
        filter.set_enabled(false);
        assert_eq!(filter.selection(), vec!["worker-1"], "disable keeps selection");

        store.clear();
        store.add(
            &[LogEvent::new("main", "again")],
            &ProcessingContext::batch("second").build(),
        );
        filter.set_enabled(true);

        assert_eq!(filter.universe(), vec!["main"]);
        assert!(filter.selection().is_empty());
    }

    /// Reload over an empty dataset yields empty universe and selection.
    #[test]
    fn test_reload_empty_dataset() {
        let store = Arc::new(EventStore::new(10));
        let filter = enabled_filter(&store);
        filter.select(["main"]);
        filter.reload();
        assert!(filter.universe().is_empty());
        assert!(filter.selection().is_empty());
        assert!(filter.accept(&LogEvent::new("anything", "x"), 0));
    }

    /// Two reloads with no dataset change produce identical state.
    #[test]
    fn test_reload_is_idempotent() {
        let store = store_with(&["b", "A", "a", "c", "b"]);
        let filter = enabled_filter(&store);
        filter.select(["a", "c"]);

        filter.reload();
        let first = filter.snapshot();
        filter.reload();
        let second = filter.snapshot();

        assert_eq!(first, second);
    }

    /// Universe order is case-insensitive with distinct case variants kept.
    #[test]
    fn test_universe_sorted_case_insensitively() {
        let store = store_with(&["zeta", "Beta", "alpha", "beta", "Alpha"]);
        let filter = enabled_filter(&store);
        assert_eq!(
            filter.universe(),
            vec!["Alpha", "alpha", "Beta", "beta", "zeta"]
        );
    }

    /// Reload picks up threads that arrived after enabling.
    #[test]
    fn test_reload_grows_universe() {
        let store = store_with(&["main"]);
        let filter = enabled_filter(&store);
        store.add(
            &[LogEvent::new("pool-3", "late")],
            &ProcessingContext::live("tail").build(),
        );
        assert_eq!(filter.universe(), vec!["main"]);
        filter.reload();
        assert_eq!(filter.universe(), vec!["main", "pool-3"]);
    }

    /// Search is a case-sensitive prefix match; the partition always covers
    /// the universe exactly.
    #[test]
    fn test_partition_invariant_across_searches() {
        let store = store_with(&["Main", "main", "worker-1", "worker-2", "Worker-3", "io"]);
        let filter = enabled_filter(&store);

        for text in ["w", "wo", "worker-", "worker-2", "W", "x", "", "m", "M"] {
            filter.set_search(text);
            assert_partition_invariant(&filter);
        }

        filter.set_search("W");
        assert_eq!(filter.partition().visible(), ["Worker-3"]);
        filter.set_search("");
        assert!(filter.partition().hidden().is_empty());
        assert_eq!(filter.phase(), ThreadFilterPhase::ActiveUnfiltered);
    }

    /// Searching deselects hidden threads, so inversion yields exactly the
    /// visible complement and hidden threads stop passing.
    #[test]
    fn test_invert_selects_exact_visible_complement() {
        let store = store_with(&["main", "worker-1", "worker-2", "worker-3"]);
        let filter = enabled_filter(&store);
        filter.select(["main", "worker-2"]);
        filter.set_search("worker");
        assert_eq!(filter.selection(), vec!["worker-2"]);

        filter.invert_selection();

        assert_eq!(filter.selection(), vec!["worker-1", "worker-3"]);
        assert!(!filter.accept(&LogEvent::new("main", "x"), 0));
        assert_eq!(visible_threads(&filter, &store), vec!["worker-1", "worker-3"]);
    }

    #[test]
    fn test_invert_twice_restores_selection() {
        let store = store_with(&["main", "worker-1", "worker-2", "worker-3"]);
        let filter = enabled_filter(&store);
        filter.select(["worker-2"]);
        filter.set_search("worker");
        let original = filter.selection();

        filter.invert_selection();
        assert_eq!(filter.selection(), vec!["worker-1", "worker-3"]);
        filter.invert_selection();

        assert_eq!(filter.selection(), original);
    }

    /// Widening the search never reselects what a narrower one dropped.
    #[test]
    fn test_search_narrows_selection_and_keeps_unknown_ids() {
        let store = store_with(&["main", "worker-1"]);
        let filter = enabled_filter(&store);
        filter.select(["main", "worker-1", "late-thread"]);

        filter.set_search("worker");
        assert_eq!(filter.selection(), vec!["late-thread", "worker-1"]);

        filter.set_search("");
        assert_eq!(filter.selection(), vec!["late-thread", "worker-1"]);
    }

    /// Inverting an empty selection selects every visible thread.
    #[test]
    fn test_invert_empty_selects_visible_pool() {
        let store = store_with(&["main", "worker-1", "worker-2"]);
        let filter = enabled_filter(&store);
        filter.set_search("worker");
        filter.invert_selection();
        assert_eq!(filter.selection(), vec!["worker-1", "worker-2"]);
    }

    #[test]
    fn test_clear_selection_reverts_to_match_all() {
        let store = store_with(&["main", "worker-1"]);
        let filter = enabled_filter(&store);
        filter.select(["main"]);
        assert_eq!(visible_threads(&filter, &store), vec!["main"]);
        filter.clear_selection();
        assert_eq!(visible_threads(&filter, &store).len(), 2);
    }

    /// The reload-threads action also clears the search text.
    #[test]
    fn test_reload_threads_resets_search() {
        let store = store_with(&["main", "worker-1"]);
        let filter = enabled_filter(&store);
        filter.set_search("work");
        filter.reload_threads();
        assert_eq!(filter.search(), "");
        assert_eq!(filter.partition().visible().len(), 2);
    }

    /// Index-based selection works over the visible pool only.
    #[test]
    fn test_select_visible_indices() {
        let store = store_with(&["main", "worker-1", "worker-2"]);
        let filter = enabled_filter(&store);
        filter.select(["worker-1"]);
        filter.set_search("worker");

        filter.select_visible_indices(&[1, 7]);

        assert_eq!(filter.selection(), vec!["worker-2"]);
        assert_eq!(filter.selected_visible_indices(), vec![1]);
    }

    /// Readers never observe a partition that breaks the invariant while
    /// another thread reloads and searches.
    #[test]
    fn test_concurrent_reload_and_reads_stay_consistent() {
        let store = store_with(&["main", "worker-1", "worker-2", "io-1"]);
        let filter = Arc::new(enabled_filter(&store));
        filter.select(["worker-1"]);

        let writer = {
            let filter = filter.clone();
            let store = store.clone();
            std::thread::spawn(move || {
                for n in 0..200 {
                    store.add(
                        &[LogEvent::new(format!("worker-{}", n % 7), "x")],
                        &ProcessingContext::live("w").build(),
                    );
                    filter.reload();
                    filter.set_search(if n % 2 == 0 { "worker" } else { "" });
                }
            })
        };

        for _ in 0..200 {
            assert_partition_invariant(&filter);
            assert!(filter.accept(&LogEvent::new("worker-1", "x"), 0));
        }
        writer.join().unwrap();
        assert_partition_invariant(&filter);
    }
}
