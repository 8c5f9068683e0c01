use std::sync::Arc;

use super::event::Event;
use super::sink::{EventSink, StdOutSink};

/// Channel-backed event bus connecting nodes and the executor to
/// pluggable sinks.
///
/// The bus hands out cheap [`flume::Sender`] emitters; a background
/// listener task drains the channel into every configured sink. Dropping
/// all emitters ends the listener.
///
/// # Examples
///
/// ```rust
/// use dispatchflow::event_bus::{Event, EventBus, MemorySink};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let sink = MemorySink::new();
/// let bus = EventBus::with_sinks(vec![Box::new(sink.clone())]);
/// bus.listen_for_events();
///
/// bus.get_emitter().send(Event::executor("s-1", "starting")).unwrap();
/// # tokio::task::yield_now().await;
/// # }
/// ```
pub struct EventBus {
    sender: flume::Sender<Event>,
    receiver: flume::Receiver<Event>,
    sinks: Arc<Vec<Box<dyn EventSink>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_sinks(vec![Box::new(StdOutSink)])
    }
}

impl EventBus {
    pub fn with_sinks(sinks: Vec<Box<dyn EventSink>>) -> Self {
        let (sender, receiver) = flume::unbounded();
        Self {
            sender,
            receiver,
            sinks: Arc::new(sinks),
        }
    }

    /// A sender usable from any node or executor context.
    pub fn get_emitter(&self) -> flume::Sender<Event> {
        self.sender.clone()
    }

    /// Spawn the listener task draining events into the sinks.
    ///
    /// The task exits once every emitter (including the bus's own) has
    /// been dropped.
    pub fn listen_for_events(&self) {
        let receiver = self.receiver.clone();
        let sinks = Arc::clone(&self.sinks);
        tokio::spawn(async move {
            while let Ok(event) = receiver.recv_async().await {
                for sink in sinks.iter() {
                    sink.handle(&event);
                }
            }
        });
    }

    /// Synchronously drain any queued events into the sinks.
    ///
    /// Useful in tests that want deterministic delivery without the
    /// listener task.
    pub fn drain(&self) {
        while let Ok(event) = self.receiver.try_recv() {
            for sink in self.sinks.iter() {
                sink.handle(&event);
            }
        }
    }
}
