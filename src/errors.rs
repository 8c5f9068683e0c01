//! Recorded, non-fatal error events.
//!
//! Domain-level problems never abort a workflow: they are appended to the
//! state's `errors` sequence, surfaced in the caller-facing outcome, and
//! the graph keeps executing. [`ErrorEvent`] is that record. Fatal,
//! infrastructure-level failures use the typed error enums on the node,
//! store, and executor instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recorded non-fatal error with scope, message, and structured details.
///
/// # JSON Serialization Format
///
/// ```json
/// {
///   "when": "2026-08-06T10:30:00Z",
///   "scope": { "scope": "node", "node": "planning" },
///   "message": "no drivers match the requested criteria",
///   "details": { "requested": 20, "matched": 0 }
/// }
/// ```
///
/// The `scope` field uses a tagged union with a discriminator named
/// `"scope"`:
/// - `"classifier"`: intent classification degraded to the heuristic
/// - `"node"`: a domain node recorded a recoverable problem (`node` name)
/// - `"tool"`: an external collaborator reported a failure (`name`)
/// - `"executor"`: the executor recorded a failure for a session
///
/// # Examples
///
/// ```
/// use dispatchflow::errors::ErrorEvent;
/// use serde_json::json;
///
/// let event = ErrorEvent::node("planning", "no drivers match")
///     .with_details(json!({"requested": 20}));
/// let json_str = serde_json::to_string(&event).unwrap();
/// assert!(json_str.contains("planning"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ErrorEvent {
    #[serde(default = "chrono::Utc::now")]
    pub when: DateTime<Utc>,
    #[serde(default)]
    pub scope: ErrorScope,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl ErrorEvent {
    /// Create a classifier-scoped event (intent classification fell back
    /// to the deterministic heuristic).
    pub fn classifier<M: Into<String>>(message: M) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Classifier,
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    /// Create a node-scoped event.
    pub fn node<S: Into<String>, M: Into<String>>(node: S, message: M) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Node { node: node.into() },
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    /// Create a tool-scoped event for an external collaborator failure.
    pub fn tool<S: Into<String>, M: Into<String>>(name: S, message: M) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Tool { name: name.into() },
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    /// Create an executor-scoped event.
    pub fn executor<S: Into<String>, M: Into<String>>(session: S, message: M) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Executor {
                session: session.into(),
            },
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    /// Attach structured details to this event.
    ///
    /// # Example
    /// ```
    /// use dispatchflow::errors::ErrorEvent;
    /// use serde_json::json;
    ///
    /// let event = ErrorEvent::tool("notification_gateway", "delivery rejected")
    ///     .with_details(json!({"action_id": "act-7"}));
    /// ```
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ErrorScope {
    #[default]
    Classifier,
    Node {
        node: String,
    },
    Tool {
        name: String,
    },
    Executor {
        session: String,
    },
}

impl ErrorScope {
    /// Short label used when rendering events for humans.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            ErrorScope::Classifier => "classifier".to_string(),
            ErrorScope::Node { node } => format!("node:{node}"),
            ErrorScope::Tool { name } => format!("tool:{name}"),
            ErrorScope::Executor { session } => format!("executor:{session}"),
        }
    }
}
