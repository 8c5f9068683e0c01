//! Lightweight event bus for workflow observability.
//!
//! Nodes emit progress events through their
//! [`NodeContext`](crate::node::NodeContext); the executor emits
//! lifecycle events per session. An [`EventBus`] fans both out to
//! pluggable [`EventSink`]s - stdout for development, a memory sink for
//! tests, or custom sinks for production streaming.

mod bus;
mod event;
mod sink;

pub use bus::EventBus;
pub use event::{Event, EventScope};
pub use sink::{EventSink, MemorySink, StdOutSink};
