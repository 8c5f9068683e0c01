//! Workflow state for the dispatchflow engine.
//!
//! [`WorkflowState`] is the single source of truth for a workflow
//! instance: identity, bounded conversation history, routing results,
//! domain context payloads, the approval gate, and the accumulated
//! outputs. It is a pure data container - the only behavior it carries is
//! construction, snapshotting, and folding new input; merging node
//! updates lives in [`crate::reducers`].
//!
//! Nodes receive a cloned snapshot of the state and express every change
//! through the [`StateUpdate`](crate::node::StateUpdate) they return, so
//! the state a node observes is never mutated underneath it.
//!
//! # Examples
//!
//! ```rust
//! use dispatchflow::state::WorkflowState;
//! use serde_json::json;
//!
//! let state = WorkflowState::builder()
//!     .org("org-1")
//!     .user("dispatcher-7")
//!     .conversation("conv-42")
//!     .session("sess-42-a")
//!     .user_message("give me 20 drivers")
//!     .context("region", json!("north"))
//!     .build();
//!
//! assert_eq!(state.session_id, "sess-42-a");
//! assert_eq!(state.messages.len(), 1);
//! assert!(!state.requires_approval());
//! ```

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ErrorEvent;
use crate::message::{push_bounded, Message};

/// Opaque description of a side effect awaiting confirmation.
///
/// The `id` is the at-most-once de-duplication key: the notification
/// gateway must treat repeated sends of the same id as a single delivery,
/// and the sending node skips the call entirely once a delivery for the
/// id is already recorded in `response_data`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    /// De-duplication key, unique per gated action.
    pub id: String,
    /// Action discriminator, e.g. `"bulk_sms"`.
    pub kind: String,
    /// Action payload, opaque to the executor.
    pub payload: Value,
}

impl PendingAction {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            payload,
        }
    }
}

/// The approval gate folded into state when a node suspends the workflow.
///
/// Invariant (maintained by the executor): while `requires_approval` is
/// `true` the checkpoint status is `SUSPENDED` and `pending_action`
/// describes the gated side effect. `approved` is tri-state: `None` until
/// a `resume` call records the human decision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalGate {
    pub requires_approval: bool,
    /// Channel of the gated action, e.g. `"sms"`.
    pub approval_type: String,
    pub pending_action: PendingAction,
    /// `None` = undecided, `Some(true)` = approved, `Some(false)` = declined.
    pub approved: Option<bool>,
    /// Human-facing prompt returned to the caller at suspension.
    pub prompt: String,
}

/// The record carried through the graph for one workflow instance.
///
/// Fields group into: identity (immutable for the instance lifetime),
/// input, routing, domain context, approval, and output. `node_history`
/// and `errors` are append-only; the executor owns `node_history`
/// entirely.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    // Identity
    pub org_id: String,
    pub user_id: String,
    pub conversation_id: String,
    /// Sole checkpoint key; immutable for the lifetime of the instance.
    pub session_id: String,

    // Input
    /// Bounded conversation history, most-recent-last.
    #[serde(default)]
    pub messages: Vec<Message>,

    // Routing
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub params: FxHashMap<String, Value>,

    // Domain context, opaque to the executor, typed per node.
    #[serde(default)]
    pub context: FxHashMap<String, Value>,

    // Approval
    #[serde(default)]
    pub approval: Option<ApprovalGate>,

    // Output
    #[serde(default)]
    pub response_text: Option<String>,
    #[serde(default)]
    pub response_data: FxHashMap<String, Value>,
    /// Non-fatal errors encountered so far; append-only.
    #[serde(default)]
    pub errors: Vec<ErrorEvent>,
    /// Ordered names of nodes executed so far; append-only audit trail.
    #[serde(default)]
    pub node_history: Vec<String>,
}

impl WorkflowState {
    /// Creates a builder for fluent construction.
    pub fn builder() -> WorkflowStateBuilder {
        WorkflowStateBuilder::default()
    }

    /// The most recent user message, if any.
    #[must_use]
    pub fn latest_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.has_role(Message::USER))
    }

    /// Whether the instance is currently waiting on an approval decision.
    #[must_use]
    pub fn requires_approval(&self) -> bool {
        self.approval
            .as_ref()
            .is_some_and(|gate| gate.requires_approval)
    }

    /// Whether a past suspension on this instance has been resolved.
    #[must_use]
    pub fn approval_resolved(&self) -> bool {
        self.approval
            .as_ref()
            .is_some_and(|gate| gate.approved.is_some())
    }

    /// Fold a new user message into the bounded history.
    pub fn fold_user_message(&mut self, content: &str) {
        push_bounded(&mut self.messages, Message::user(content));
    }

    /// Cloned snapshot handed to nodes and router functions.
    ///
    /// The clone is what makes the merge discipline airtight: nodes read
    /// this copy and can only change the live state through the update
    /// they return.
    #[must_use]
    pub fn snapshot(&self) -> WorkflowState {
        self.clone()
    }
}

/// Fluent builder for [`WorkflowState`].
///
/// # Examples
///
/// ```rust
/// use dispatchflow::state::WorkflowState;
///
/// let state = WorkflowState::builder()
///     .org("org-1")
///     .user("u-9")
///     .conversation("c-3")
///     .session("s-3-b")
///     .user_message("notify all drivers about the shift change")
///     .build();
/// assert_eq!(state.node_history.len(), 0);
/// ```
#[derive(Debug, Default)]
pub struct WorkflowStateBuilder {
    org_id: String,
    user_id: String,
    conversation_id: String,
    session_id: String,
    messages: Vec<Message>,
    context: FxHashMap<String, Value>,
}

impl WorkflowStateBuilder {
    pub fn org(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = org_id.into();
        self
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = conversation_id.into();
        self
    }

    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Appends a user message to the initial history.
    pub fn user_message(mut self, content: &str) -> Self {
        self.messages.push(Message::user(content));
        self
    }

    /// Appends a message with an explicit role.
    pub fn message(mut self, role: &str, content: &str) -> Self {
        self.messages.push(Message::new(role, content));
        self
    }

    /// Seeds a domain-context entry.
    pub fn context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    pub fn build(self) -> WorkflowState {
        WorkflowState {
            org_id: self.org_id,
            user_id: self.user_id,
            conversation_id: self.conversation_id,
            session_id: self.session_id,
            messages: self.messages,
            intent: None,
            confidence: None,
            params: FxHashMap::default(),
            context: self.context,
            approval: None,
            response_text: None,
            response_data: FxHashMap::default(),
            errors: Vec::new(),
            node_history: Vec::new(),
        }
    }
}
