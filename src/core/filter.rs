// LogSift - core/filter.rs
//
// Composable filter chain for log events.
// All enabled filters are AND-combined; disabled filters are skipped.
// Core layer: pure logic, no I/O or UI dependencies.

use crate::core::model::{Level, LogEvent};
use crate::util::constants::{
    LEVEL_FILTER_DESCRIPTION, LEVEL_FILTER_NAME, TEXT_FILTER_DESCRIPTION, TEXT_FILTER_NAME,
};
use crate::util::error::FilterError;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Callback invoked with a filter's name whenever its enabled flag or its
/// configuration changes, so the view knows to re-query visibility.
pub type ChangeListener = Arc<dyn Fn(&str) + Send + Sync>;

// =============================================================================
// Filter contract
// =============================================================================

/// Identity and toggle state shared by every filter.
pub struct FilterMeta {
    name: String,
    description: String,
    enabled: AtomicBool,
    listener: RwLock<Option<ChangeListener>>,
}

impl FilterMeta {
    /// Filters start disabled.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            enabled: AtomicBool::new(false),
            listener: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn store_enabled(&self, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::AcqRel);
        if was != enabled {
            tracing::debug!(filter = %self.name, enabled, "Filter toggled");
            self.notify_changed();
        }
    }

    pub fn set_listener(&self, listener: Option<ChangeListener>) {
        *self.listener.write() = listener;
    }

    /// Tell the registered listener (if any) that this filter changed.
    pub fn notify_changed(&self) {
        // Clone out so the callback never runs under our lock.
        let listener = self.listener.read().clone();
        if let Some(listener) = listener {
            listener(&self.name);
        }
    }
}

impl std::fmt::Debug for FilterMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterMeta")
            .field("name", &self.name)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// A named, toggleable predicate over events.
///
/// Implementors provide `meta` and `matches`; `accept` is what the chain
/// calls and always passes events while the filter is disabled.
pub trait LogFilter: Send + Sync {
    fn meta(&self) -> &FilterMeta;

    /// The predicate itself, consulted only while enabled.
    fn matches(&self, event: &LogEvent, row: usize) -> bool;

    /// Activation hook, run on every enable request before the filter is
    /// marked enabled.
    fn activate(&self) {}

    fn name(&self) -> &str {
        self.meta().name()
    }

    fn description(&self) -> &str {
        self.meta().description()
    }

    fn is_enabled(&self) -> bool {
        self.meta().is_enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        if enabled {
            self.activate();
        }
        self.meta().store_enabled(enabled);
    }

    fn accept(&self, event: &LogEvent, row: usize) -> bool {
        !self.is_enabled() || self.matches(event, row)
    }
}

// =============================================================================
// Filter chain
// =============================================================================

/// Ordered collection of filters, AND-combined.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn LogFilter>>,
    listener: Option<ChangeListener>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter. It inherits the chain's change listener.
    pub fn add(&mut self, filter: Arc<dyn LogFilter>) {
        filter.meta().set_listener(self.listener.clone());
        self.filters.push(filter);
    }

    /// Install a change listener on the chain and every filter in it.
    pub fn set_change_listener(&mut self, listener: ChangeListener) {
        for filter in &self.filters {
            filter.meta().set_listener(Some(listener.clone()));
        }
        self.listener = Some(listener);
    }

    pub fn filters(&self) -> &[Arc<dyn LogFilter>] {
        &self.filters
    }

    /// Look up a filter by exact name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn LogFilter>> {
        self.filters.iter().find(|f| f.name() == name)
    }

    /// Enable or disable the named filter. Enabling runs its activation hook
    /// first so it never filters on stale state.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<(), FilterError> {
        let filter = self.get(name).ok_or_else(|| FilterError::UnknownFilter {
            name: name.to_string(),
        })?;
        filter.set_enabled(enabled);
        Ok(())
    }

    /// Names of the currently enabled filters, in chain order.
    pub fn enabled_names(&self) -> Vec<&str> {
        self.filters
            .iter()
            .filter(|f| f.is_enabled())
            .map(|f| f.name())
            .collect()
    }

    /// True iff every enabled filter accepts the event.
    pub fn is_row_visible(&self, event: &LogEvent, row: usize) -> bool {
        self.filters.iter().all(|f| f.accept(event, row))
    }

    /// Indices of the visible rows in `events`.
    ///
    /// Returns indices rather than copies so the view can scroll virtually
    /// over the full dataset.
    pub fn visible_rows(&self, events: &[LogEvent]) -> Vec<usize> {
        if self.filters.iter().all(|f| !f.is_enabled()) {
            return (0..events.len()).collect();
        }
        events
            .iter()
            .enumerate()
            .filter(|(row, event)| self.is_row_visible(event, *row))
            .map(|(row, _)| row)
            .collect()
    }
}

// =============================================================================
// Level filter
// =============================================================================

/// Hides events below a minimum severity.
pub struct LevelFilter {
    meta: FilterMeta,
    min_level: RwLock<Level>,
}

impl LevelFilter {
    pub fn new(min_level: Level) -> Self {
        Self {
            meta: FilterMeta::new(LEVEL_FILTER_NAME, LEVEL_FILTER_DESCRIPTION),
            min_level: RwLock::new(min_level),
        }
    }

    pub fn min_level(&self) -> Level {
        *self.min_level.read()
    }

    pub fn set_min_level(&self, level: Level) {
        *self.min_level.write() = level;
        self.meta.notify_changed();
    }
}

impl LogFilter for LevelFilter {
    fn meta(&self) -> &FilterMeta {
        &self.meta
    }

    fn matches(&self, event: &LogEvent, _row: usize) -> bool {
        event.level >= *self.min_level.read()
    }
}

// =============================================================================
// Text filter
// =============================================================================

/// Case-insensitive substring search over the event message.
/// An empty search string matches everything.
pub struct TextFilter {
    meta: FilterMeta,
    /// Stored lowercased.
    needle: RwLock<String>,
}

impl TextFilter {
    pub fn new(text: &str) -> Self {
        Self {
            meta: FilterMeta::new(TEXT_FILTER_NAME, TEXT_FILTER_DESCRIPTION),
            needle: RwLock::new(text.to_lowercase()),
        }
    }

    pub fn set_text(&self, text: &str) {
        *self.needle.write() = text.to_lowercase();
        self.meta.notify_changed();
    }
}

impl LogFilter for TextFilter {
    fn meta(&self) -> &FilterMeta {
        &self.meta
    }

    fn matches(&self, event: &LogEvent, _row: usize) -> bool {
        let needle = self.needle.read();
        needle.is_empty() || event.message.to_lowercase().contains(needle.as_str())
    }
}
