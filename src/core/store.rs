// LogSift - core/store.rs
//
// Buffering event store: the in-process dataset that the view layer renders
// and that filters query on reload. Row index = arrival position.
//
// Events past the capacity are rejected rather than evicting old rows, so a
// row index handed to the view never changes meaning.

use crate::core::context::ProcessingContext;
use crate::core::model::LogEvent;
use crate::core::sink::{EventCollector, EventListener};
use crate::util::error::ListenerError;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// Read-only view of the full dataset, as required by filters that
/// resynchronise from it.
pub trait DatasetSource: Send + Sync {
    /// Every event currently in the dataset, in row order.
    fn all_events(&self) -> Vec<LogEvent>;
}

/// Thread-safe, append-only event buffer.
#[derive(Debug)]
pub struct EventStore {
    events: RwLock<Vec<LogEvent>>,
    capacity: usize,
    /// Set once the capacity warning has been logged for the current fill.
    full_warned: AtomicBool,
}

impl EventStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            capacity,
            full_warned: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Event at `row`, cloned.
    pub fn get(&self, row: usize) -> Option<LogEvent> {
        self.events.read().get(row).cloned()
    }

    /// Events from `start` to the end, cloned. Used to render newly arrived rows.
    pub fn since(&self, start: usize) -> Vec<LogEvent> {
        let events = self.events.read();
        events.get(start..).map(<[LogEvent]>::to_vec).unwrap_or_default()
    }

    /// Run `f` over the rows under a single read lock.
    pub fn with_events<R>(&self, f: impl FnOnce(&[LogEvent]) -> R) -> R {
        f(&self.events.read())
    }

    fn push(&self, event: &LogEvent) -> Result<(), ListenerError> {
        let mut events = self.events.write();
        if events.len() >= self.capacity {
            if !self.full_warned.swap(true, Ordering::Relaxed) {
                tracing::warn!(
                    max = self.capacity,
                    "Event store full; further events are dropped"
                );
            }
            return Err(ListenerError::CapacityReached { max: self.capacity });
        }
        events.push(event.clone());
        Ok(())
    }
}

impl EventListener for EventStore {
    fn on_event_parsed(
        &self,
        event: &LogEvent,
        _context: &ProcessingContext,
    ) -> Result<(), ListenerError> {
        self.push(event)
    }
}

impl EventCollector for EventStore {
    fn add(&self, events: &[LogEvent], context: &ProcessingContext) {
        let mut accepted = 0usize;
        for event in events {
            if self.push(event).is_ok() {
                accepted += 1;
            }
        }
        tracing::trace!(session = %context, accepted, "Events buffered");
    }

    fn get_all(&self) -> Vec<LogEvent> {
        self.events.read().clone()
    }

    fn clear(&self) -> usize {
        let removed = std::mem::take(&mut *self.events.write()).len();
        self.full_warned.store(false, Ordering::Relaxed);
        tracing::debug!(removed, "Event store cleared");
        removed
    }
}

impl DatasetSource for EventStore {
    fn all_events(&self) -> Vec<LogEvent> {
        self.get_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> std::sync::Arc<ProcessingContext> {
        ProcessingContext::batch("store-test").build()
    }

    #[test]
    fn test_store_keeps_arrival_order() {
        let store = EventStore::new(10);
        store.add(
            &[LogEvent::new("a", "1"), LogEvent::new("b", "2")],
            &ctx(),
        );
        store
            .on_event_parsed(&LogEvent::new("c", "3"), &ctx())
            .unwrap();

        let threads: Vec<_> = store.all_events().into_iter().map(|e| e.thread).collect();
        assert_eq!(threads, vec!["a", "b", "c"]);
        assert_eq!(store.get(1).unwrap().message, "2");
        assert_eq!(store.since(2).len(), 1);
        assert!(store.since(9).is_empty());
    }

    #[test]
    fn test_store_rejects_past_capacity() {
        let store = EventStore::new(2);
        let c = ctx();
        for n in 0..2 {
            store
                .on_event_parsed(&LogEvent::new("t", n.to_string()), &c)
                .unwrap();
        }
        let err = store
            .on_event_parsed(&LogEvent::new("t", "overflow"), &c)
            .unwrap_err();
        assert!(matches!(err, ListenerError::CapacityReached { max: 2 }));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_clear_returns_count_and_empties() {
        let store = EventStore::new(10);
        store.add(&[LogEvent::new("a", "1"), LogEvent::new("b", "2")], &ctx());
        assert_eq!(store.clear(), 2);
        assert!(store.is_empty());
        assert_eq!(store.clear(), 0);
    }
}
