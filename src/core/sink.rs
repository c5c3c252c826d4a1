// LogSift - core/sink.rs
//
// Streaming ingestion endpoint. Producers hand parsed events to an
// `EventSink`, which forwards each one to its listener. A failing event
// (error return or panic) is reported to the diagnostics channel and
// dispatch moves on to the next event; nothing is ever returned to the
// producer and nothing is retried.

use crate::core::context::ProcessingContext;
use crate::core::diagnostics::{catch_absorbed, panic_message, Diagnostics, Fault, FaultOrigin};
use crate::core::model::LogEvent;
use crate::util::error::ListenerError;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Receives each event dispatched by an `EventSink`.
///
/// Implementations are shared across producer threads, so they take `&self`
/// and use interior mutability for any state they keep.
pub trait EventListener: Send + Sync {
    fn on_event_parsed(
        &self,
        event: &LogEvent,
        context: &ProcessingContext,
    ) -> Result<(), ListenerError>;
}

impl<F> EventListener for F
where
    F: Fn(&LogEvent, &ProcessingContext) -> Result<(), ListenerError> + Send + Sync,
{
    fn on_event_parsed(
        &self,
        event: &LogEvent,
        context: &ProcessingContext,
    ) -> Result<(), ListenerError> {
        self(event, context)
    }
}

/// Common surface of streaming and buffering collectors.
pub trait EventCollector: Send + Sync {
    /// Accept a batch of events from one processing session.
    fn add(&self, events: &[LogEvent], context: &ProcessingContext);

    /// All events currently held.
    fn get_all(&self) -> Vec<LogEvent>;

    /// Drop all held events, returning how many were dropped.
    fn clear(&self) -> usize;
}

/// Pass-through collector: forwards every event to its listener and keeps
/// nothing.
pub struct EventSink {
    listener: Arc<dyn EventListener>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl EventSink {
    pub fn new(listener: Arc<dyn EventListener>, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            listener,
            diagnostics,
        }
    }

    fn report(&self, context: &ProcessingContext, row: usize, message: String) {
        self.diagnostics.severe(Fault {
            origin: FaultOrigin::Event {
                session: context.to_string(),
                row,
            },
            message: format!("Error processing log data {message}"),
        });
    }
}

impl EventCollector for EventSink {
    fn add(&self, events: &[LogEvent], context: &ProcessingContext) {
        for (row, event) in events.iter().enumerate() {
            let outcome = catch_absorbed(AssertUnwindSafe(|| {
                self.listener.on_event_parsed(event, context)
            }));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => self.report(context, row, e.to_string()),
                Err(payload) => self.report(context, row, panic_message(payload.as_ref())),
            }
        }
    }

    fn get_all(&self) -> Vec<LogEvent> {
        Vec::new()
    }

    fn clear(&self) -> usize {
        0
    }
}
