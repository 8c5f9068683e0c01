use std::sync::{Arc, Mutex};

use super::event::Event;

/// Destination for events drained off the bus.
///
/// Sinks run on the bus's listener task; keep `handle` cheap and
/// non-blocking.
pub trait EventSink: Send + Sync {
    fn handle(&self, event: &Event);
}

/// Sink that writes one line per event to stdout.
#[derive(Debug, Default)]
pub struct StdOutSink;

impl EventSink for StdOutSink {
    fn handle(&self, event: &Event) {
        println!("{event}");
    }
}

/// Sink that retains events in memory, for tests and diagnostics.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cloned view of everything captured so far.
    pub fn snapshot(&self) -> Vec<Event> {
        self.events.lock().expect("memory sink poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("memory sink poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for MemorySink {
    fn handle(&self, event: &Event) {
        self.events
            .lock()
            .expect("memory sink poisoned")
            .push(event.clone());
    }
}
