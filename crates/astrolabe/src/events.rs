//! Lifecycle events published by layouts and managers.
//!
//! The engine never owns a bus: callers hand in an [`EventSink`] through the
//! [`LayoutContext`](crate::layout::LayoutContext) and receive
//! [`LayoutEvent`]s synchronously from whichever thread publishes them.

use std::sync::{Mutex, mpsc::Sender};

use log::trace;

/// An event emitted by the layout engine.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutEvent {
    /// A layout began (or was re-applied)
    Started { name: String },
    /// A layout stopped, either on request or after settling
    Stopped { name: String },
    /// Adaptive selection switched from one layout to another
    Adapted {
        from: Option<String>,
        to: String,
        reason: String,
    },
    /// A background failure halted a layout
    Error { error: String },
}

impl LayoutEvent {
    /// The topic name under which the event is published
    pub fn topic(&self) -> &'static str {
        match self {
            LayoutEvent::Started { .. } => "layout:started",
            LayoutEvent::Stopped { .. } => "layout:stopped",
            LayoutEvent::Adapted { .. } => "layout:adapted",
            LayoutEvent::Error { .. } => "layout:error",
        }
    }
}

/// Receiver of engine events.
pub trait EventSink: Send + Sync {
    /// Publish one event
    fn publish(&self, event: LayoutEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, event: LayoutEvent) {
        trace!(topic = event.topic(); "Dropping layout event");
    }
}

impl EventSink for Sender<LayoutEvent> {
    fn publish(&self, event: LayoutEvent) {
        // A dropped receiver only means nobody is listening anymore.
        let _ = self.send(event);
    }
}

/// Sink that records every event in memory.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<LayoutEvent>>,
}

impl EventLog {
    /// Creates an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events in publish order
    pub fn events(&self) -> Vec<LayoutEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Topics of the recorded events in publish order
    pub fn topics(&self) -> Vec<&'static str> {
        self.events().iter().map(LayoutEvent::topic).collect()
    }
}

impl EventSink for EventLog {
    fn publish(&self, event: LayoutEvent) {
        let mut events = self
            .events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        events.push(event);
    }
}
