use chrono::{DateTime, Utc};
use std::fmt;

/// A structured progress event emitted during workflow execution.
///
/// Events are observability output, not state: they stream to the bus's
/// sinks and are never persisted with the checkpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub when: DateTime<Utc>,
    pub scope: EventScope,
    pub message: String,
}

/// Where in the engine an event originated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventScope {
    /// Emitted by a node via `NodeContext::emit`.
    Node { node: String, step: u64 },
    /// Emitted by the executor while driving a session.
    Executor { session: String },
}

impl Event {
    /// Create a node-scoped event.
    pub fn node(node: impl Into<String>, step: u64, message: impl Into<String>) -> Self {
        Self {
            when: Utc::now(),
            scope: EventScope::Node {
                node: node.into(),
                step,
            },
            message: message.into(),
        }
    }

    /// Create an executor-scoped event.
    pub fn executor(session: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            when: Utc::now(),
            scope: EventScope::Executor {
                session: session.into(),
            },
            message: message.into(),
        }
    }

    /// Short label describing the event's origin.
    #[must_use]
    pub fn scope_label(&self) -> String {
        match &self.scope {
            EventScope::Node { node, step } => format!("{node}@{step}"),
            EventScope::Executor { session } => format!("executor:{session}"),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.when.to_rfc3339(),
            self.scope_label(),
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_labels() {
        assert_eq!(Event::node("classify", 1, "x").scope_label(), "classify@1");
        assert_eq!(
            Event::executor("s-1", "x").scope_label(),
            "executor:s-1"
        );
    }

    #[test]
    fn display_includes_message() {
        let rendered = Event::node("planning", 2, "scoring drivers").to_string();
        assert!(rendered.contains("planning@2"));
        assert!(rendered.contains("scoring drivers"));
    }
}
