//! Node execution contract for the dispatchflow engine.
//!
//! This module provides the abstractions every executable workflow node
//! implements: the [`Node`] trait, the execution context, the partial
//! state update a node returns, the suspension hint, and the fatal error
//! type.
//!
//! # Contract
//!
//! A node receives a cloned state snapshot and returns a [`NodeOutput`]:
//! a [`StateUpdate`] naming only the fields it changes, plus an optional
//! [`NodeHint`] that can force suspension at an approval gate. Nodes must
//! be idempotent under re-execution with identical input state - after a
//! crash the executor may re-run the current node if the post-execution
//! checkpoint was never persisted.
//!
//! # Error Handling
//!
//! Two distinct channels:
//! 1. **Domain-level, recoverable**: encode as [`ErrorEvent`]s in the
//!    update (plus a response describing the condition) and return `Ok` -
//!    the workflow terminates normally.
//! 2. **Infrastructure-level, fatal**: return `Err(NodeError)` - the
//!    executor marks the workflow `FAILED`.

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;

use crate::errors::ErrorEvent;
use crate::event_bus::Event;
use crate::message::Message;
use crate::state::{PendingAction, WorkflowState};

// ============================================================================
// Core Trait
// ============================================================================

/// A single unit of work within a workflow graph.
///
/// # Design Principles
///
/// - **Stateless**: nodes hold collaborators, not per-session state
/// - **Idempotent**: re-execution with identical input must be safe
/// - **Isolated**: effects flow through the returned update or through
///   collaborators that de-duplicate on [`PendingAction::id`]
///
/// # Examples
///
/// ```rust
/// use dispatchflow::node::{Node, NodeContext, NodeError, NodeOutput, StateUpdate};
/// use dispatchflow::state::WorkflowState;
/// use async_trait::async_trait;
/// use serde_json::json;
///
/// struct PlanSummaryNode;
///
/// #[async_trait]
/// impl Node for PlanSummaryNode {
///     fn declared_keys(&self) -> &'static [&'static str] {
///         &["plan_summary"]
///     }
///
///     async fn run(
///         &self,
///         snapshot: WorkflowState,
///         ctx: NodeContext,
///     ) -> Result<NodeOutput, NodeError> {
///         ctx.emit("summarizing active plan")?;
///         let update = StateUpdate::new()
///             .with_context_entry("plan_summary", json!({"active": true}))
///             .with_response_text(format!("Plan ready for {}", snapshot.org_id));
///         Ok(NodeOutput::advance(update))
///     }
/// }
/// ```
#[async_trait]
pub trait Node: Send + Sync {
    /// Context and response-data keys this node is allowed to write.
    ///
    /// The merge rejects any key outside this set with a
    /// [`SchemaError`](crate::reducers::SchemaError), so contract drift
    /// between a node and its consumers surfaces at the first write, not
    /// downstream.
    fn declared_keys(&self) -> &'static [&'static str] {
        &[]
    }

    /// Execute this node against a state snapshot.
    async fn run(&self, snapshot: WorkflowState, ctx: NodeContext)
        -> Result<NodeOutput, NodeError>;
}

// ============================================================================
// Execution Context
// ============================================================================

/// Execution context passed to nodes during workflow execution.
#[derive(Clone, Debug)]
pub struct NodeContext {
    /// Name this node is registered under.
    pub node: String,
    /// Position in the audit trail (number of nodes executed before this
    /// one for the session).
    pub step: u64,
    /// Session being advanced.
    pub session_id: String,
    /// Channel for emitting events to the engine's event bus.
    pub event_sender: flume::Sender<Event>,
}

impl NodeContext {
    /// Emit a node-scoped progress event enriched with this context's
    /// metadata.
    pub fn emit(&self, message: impl Into<String>) -> Result<(), NodeContextError> {
        self.event_sender
            .send(Event::node(self.node.clone(), self.step, message))
            .map_err(|_| NodeContextError::EventBusUnavailable)
    }
}

// ============================================================================
// State Updates
// ============================================================================

/// Partial state update returned by node execution.
///
/// All fields are optional; unspecified fields retain their prior values.
/// `messages` and `errors` are append-type; `context` and `response_data`
/// merge shallowly under declared-key validation; the remaining fields
/// replace. The executor owns `node_history` - nodes cannot touch it.
///
/// # Examples
///
/// ```rust
/// use dispatchflow::node::StateUpdate;
/// use dispatchflow::errors::ErrorEvent;
/// use serde_json::json;
///
/// let update = StateUpdate::new()
///     .with_intent("selection", 0.9)
///     .with_context_entry("drivers", json!([{"id": "d1"}]))
///     .with_errors(vec![ErrorEvent::node("planning", "roster is stale")]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct StateUpdate {
    /// Messages to append to the conversation history.
    pub messages: Option<Vec<Message>>,
    /// Classified intent; replaces the prior value.
    pub intent: Option<String>,
    /// Classification confidence in `0.0..=1.0`; replaces.
    pub confidence: Option<f64>,
    /// Extracted parameters; a reclassification replaces the map wholesale.
    pub params: Option<FxHashMap<String, Value>>,
    /// Domain-context entries to merge; keys must be declared by the node.
    pub context: Option<FxHashMap<String, Value>>,
    /// Response text; replaces.
    pub response_text: Option<String>,
    /// Structured response entries to merge; keys must be declared.
    pub response_data: Option<FxHashMap<String, Value>>,
    /// Non-fatal errors to append.
    pub errors: Option<Vec<ErrorEvent>>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = Some(messages);
        self
    }

    /// Sets intent and confidence together - a classification is never
    /// half-written.
    #[must_use]
    pub fn with_intent(mut self, intent: impl Into<String>, confidence: f64) -> Self {
        self.intent = Some(intent.into());
        self.confidence = Some(confidence);
        self
    }

    #[must_use]
    pub fn with_params(mut self, params: FxHashMap<String, Value>) -> Self {
        self.params = Some(params);
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: FxHashMap<String, Value>) -> Self {
        self.context = Some(context);
        self
    }

    /// Convenience for a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context
            .get_or_insert_with(FxHashMap::default)
            .insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_response_text(mut self, text: impl Into<String>) -> Self {
        self.response_text = Some(text.into());
        self
    }

    /// Convenience for a single response-data entry.
    #[must_use]
    pub fn with_response_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.response_data
            .get_or_insert_with(FxHashMap::default)
            .insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_errors(mut self, errors: Vec<ErrorEvent>) -> Self {
        self.errors = Some(errors);
        self
    }
}

// ============================================================================
// Control Hints
// ============================================================================

/// Suspension request emitted alongside a state update.
///
/// The executor folds this into an
/// [`ApprovalGate`](crate::state::ApprovalGate), persists the checkpoint
/// as `SUSPENDED`, and returns the prompt to the caller. Execution only
/// continues when a separate `resume` call supplies the decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApprovalRequest {
    /// Channel of the gated action, e.g. `"sms"`.
    pub approval_type: String,
    /// The side effect awaiting confirmation.
    pub pending_action: PendingAction,
    /// Human-facing prompt shown to the approver.
    pub prompt: String,
}

/// Routing intent a node can express independently of the graph's edges.
///
/// Kept separate from the state update so control flow never rides inside
/// state mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeHint {
    /// Stop here and wait for an approval decision.
    Suspend(ApprovalRequest),
}

/// Result of executing one node: the state delta plus an optional
/// control hint.
#[derive(Clone, Debug, Default)]
pub struct NodeOutput {
    pub update: StateUpdate,
    pub hint: Option<NodeHint>,
}

impl NodeOutput {
    /// Continue to the node's successor after merging `update`.
    #[must_use]
    pub fn advance(update: StateUpdate) -> Self {
        Self {
            update,
            hint: None,
        }
    }

    /// Merge `update`, then suspend at an approval gate.
    #[must_use]
    pub fn suspend(update: StateUpdate, request: ApprovalRequest) -> Self {
        Self {
            update,
            hint: Some(NodeHint::Suspend(request)),
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur when using NodeContext methods.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeContextError {
    /// Event could not be sent because the event bus is disconnected.
    #[error("failed to emit event: event bus unavailable")]
    #[diagnostic(
        code(dispatchflow::node::event_bus_unavailable),
        help("The event bus may be disconnected. Check the executor's bus lifecycle.")
    )]
    EventBusUnavailable,
}

/// Fatal, infrastructure-level node failures.
///
/// Returning one of these marks the workflow `FAILED`. Recoverable
/// domain conditions belong in `StateUpdate::errors` instead.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    /// Expected input data is missing from the state snapshot.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(dispatchflow::node::missing_input),
        help("Check that an upstream node produced the required data.")
    )]
    MissingInput { what: &'static str },

    /// External collaborator is unreachable or returned a hard failure.
    #[error("collaborator error ({collaborator}): {message}")]
    #[diagnostic(code(dispatchflow::node::collaborator))]
    Collaborator {
        collaborator: &'static str,
        message: String,
    },

    /// A collaborator call exceeded its own latency bound.
    #[error("collaborator timeout ({collaborator})")]
    #[diagnostic(
        code(dispatchflow::node::timeout),
        help("Collaborators bound their own call latency; the executor surfaces the timeout instead of hanging.")
    )]
    Timeout { collaborator: &'static str },

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    #[diagnostic(code(dispatchflow::node::serde_json))]
    Serde(#[from] serde_json::Error),

    /// Event bus communication error.
    #[error("event bus error: {0}")]
    #[diagnostic(code(dispatchflow::node::event_bus))]
    EventBus(#[from] NodeContextError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn update_builders_compose() {
        let update = StateUpdate::new()
            .with_intent("selection", 0.9)
            .with_context_entry("drivers", json!([1, 2]))
            .with_context_entry("plan", json!("p-1"))
            .with_response_entry("count", json!(2));
        assert_eq!(update.intent.as_deref(), Some("selection"));
        assert_eq!(update.confidence, Some(0.9));
        assert_eq!(update.context.as_ref().unwrap().len(), 2);
        assert_eq!(
            update.response_data.as_ref().unwrap().get("count"),
            Some(&json!(2))
        );
    }

    #[test]
    fn suspend_output_carries_request() {
        let request = ApprovalRequest {
            approval_type: "sms".into(),
            pending_action: PendingAction::new("act-1", "bulk_sms", json!({})),
            prompt: "Send to 20 drivers?".into(),
        };
        let out = NodeOutput::suspend(StateUpdate::new(), request.clone());
        assert_eq!(out.hint, Some(NodeHint::Suspend(request)));
        assert!(NodeOutput::advance(StateUpdate::new()).hint.is_none());
    }
}
