//! Core identifier types for the dispatchflow workflow engine.
//!
//! This module defines the fundamental types used to name nodes in a
//! workflow graph and to describe the lifecycle status of a workflow
//! instance. Both carry stable string encodings because they are written
//! into checkpoints and must round-trip across process restarts.
//!
//! # Key Types
//!
//! - [`NodeId`]: Identifies a node in the workflow graph, or the terminal
//!   marker [`NodeId::End`]
//! - [`WorkflowStatus`]: Lifecycle state of a workflow instance
//!
//! # Examples
//!
//! ```rust
//! use dispatchflow::types::{NodeId, WorkflowStatus};
//!
//! let planning = NodeId::named("planning");
//! assert_eq!(planning.encode(), "Node:planning");
//! assert_eq!(NodeId::decode("Node:planning"), planning);
//!
//! assert_eq!(WorkflowStatus::Suspended.as_str(), "SUSPENDED");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a node within a workflow graph.
///
/// `NodeId` is the unique handle for an executable node, plus the special
/// [`End`](Self::End) marker that terminates execution. Unlike executable
/// nodes, `End` is virtual: it is never registered and never runs; routing
/// to it completes the workflow.
///
/// # Persistence
///
/// `NodeId` supports both serde serialization and the
/// [`encode`](Self::encode)/[`decode`](Self::decode) string forms used in
/// checkpoint rows.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeId {
    /// Terminal marker completing a workflow branch. Virtual: never
    /// registered and never executed.
    End,

    /// An executable node registered under a user-chosen name.
    ///
    /// Names should be descriptive and unique within the graph, e.g.
    /// `"classify"`, `"planning"`, `"response_generator"`.
    Named(String),
}

impl NodeId {
    /// Convenience constructor for a named node.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        NodeId::Named(name.into())
    }

    /// Encode a `NodeId` into its persisted string form.
    ///
    /// - `End` → `"End"`
    /// - `Named("x")` → `"Node:x"`
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use dispatchflow::types::NodeId;
    /// assert_eq!(NodeId::End.encode(), "End");
    /// assert_eq!(NodeId::named("classify").encode(), "Node:classify");
    /// ```
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            NodeId::End => "End".to_string(),
            NodeId::Named(s) => format!("Node:{s}"),
        }
    }

    /// Decode a persisted string form back into a `NodeId`.
    ///
    /// Unrecognized formats fall back to `Named(s)` so older encodings
    /// remain loadable.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use dispatchflow::types::NodeId;
    /// assert_eq!(NodeId::decode("End"), NodeId::End);
    /// assert_eq!(NodeId::decode("Node:planning"), NodeId::named("planning"));
    /// assert_eq!(NodeId::decode("planning"), NodeId::named("planning"));
    /// ```
    pub fn decode(s: &str) -> Self {
        if s == "End" {
            NodeId::End
        } else if let Some(rest) = s.strip_prefix("Node:") {
            NodeId::Named(rest.to_string())
        } else {
            NodeId::Named(s.to_string())
        }
    }

    /// Returns `true` if this is the [`End`](Self::End) marker.
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }

    /// Returns the node name, or `None` for [`End`](Self::End).
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            NodeId::End => None,
            NodeId::Named(s) => Some(s),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::End => write!(f, "End"),
            Self::Named(name) => write!(f, "{name}"),
        }
    }
}

// Allow string literals where a NodeId is expected.
impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        match s {
            "End" => NodeId::End,
            other => NodeId::Named(other.to_string()),
        }
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId::from(s.as_str())
    }
}

/// Lifecycle status of a workflow instance.
///
/// Status transitions are driven exclusively by the executor:
///
/// ```text
/// RUNNING → SUSPENDED → RUNNING → COMPLETED   (approval path)
/// RUNNING → COMPLETED                          (straight-through)
/// any     → FAILED                             (unrecoverable error)
/// ```
///
/// `Completed` and `Failed` are terminal: a checkpoint in either status is
/// never advanced again under the same session id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowStatus {
    /// The instance is executing, or was interrupted mid-run and may be
    /// continued by the next `advance` call.
    Running,
    /// The instance stopped at an approval gate and is waiting for a
    /// `resume` call. No in-process resource is held while suspended.
    Suspended,
    /// The instance reached the terminal marker.
    Completed,
    /// The instance hit an unrecoverable error and will not be advanced.
    Failed,
}

impl WorkflowStatus {
    /// Stable uppercase encoding used in checkpoint rows.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Running => "RUNNING",
            WorkflowStatus::Suspended => "SUSPENDED",
            WorkflowStatus::Completed => "COMPLETED",
            WorkflowStatus::Failed => "FAILED",
        }
    }

    /// Parse the persisted encoding produced by [`as_str`](Self::as_str).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RUNNING" => Some(WorkflowStatus::Running),
            "SUSPENDED" => Some(WorkflowStatus::Suspended),
            "COMPLETED" => Some(WorkflowStatus::Completed),
            "FAILED" => Some(WorkflowStatus::Failed),
            _ => None,
        }
    }

    /// Returns `true` for `Completed` and `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Failed)
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_encode_decode_roundtrip() {
        for id in [NodeId::End, NodeId::named("classify"), NodeId::named("a b")] {
            assert_eq!(NodeId::decode(&id.encode()), id);
        }
    }

    #[test]
    fn node_id_from_str() {
        assert_eq!(NodeId::from("End"), NodeId::End);
        assert_eq!(NodeId::from("planning"), NodeId::named("planning"));
    }

    #[test]
    fn status_roundtrip_and_terminality() {
        for status in [
            WorkflowStatus::Running,
            WorkflowStatus::Suspended,
            WorkflowStatus::Completed,
            WorkflowStatus::Failed,
        ] {
            assert_eq!(WorkflowStatus::parse(status.as_str()), Some(status));
        }
        assert!(WorkflowStatus::Completed.is_terminal());
        assert!(WorkflowStatus::Failed.is_terminal());
        assert!(!WorkflowStatus::Suspended.is_terminal());
        assert_eq!(WorkflowStatus::parse("DONE"), None);
    }
}
