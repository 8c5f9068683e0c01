//! Edge types and router functions for conditional graph flow.
//!
//! Edges are data, not code: each registered node maps to exactly one
//! [`Successor`] - a fixed target, the terminal marker, or a router
//! function evaluated against the current state. Routers return the
//! *name* of the next node (or `"End"`); the executor validates the name
//! against the graph and fails the workflow on an unknown target instead
//! of looping.

use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

use crate::state::WorkflowState;
use crate::types::NodeId;

/// Router function for conditional edges.
///
/// Takes the current [`WorkflowState`] and returns the target node name
/// (`"End"` terminates the workflow). Routers must be pure over the
/// state they are given.
///
/// # Examples
///
/// ```
/// use dispatchflow::graph::RouterFn;
/// use std::sync::Arc;
///
/// let by_confidence: RouterFn = Arc::new(|state| {
///     if state.confidence.unwrap_or(0.0) < 0.5 {
///         "response_generator".to_string()
///     } else {
///         "planning".to_string()
///     }
/// });
/// ```
pub type RouterFn = Arc<dyn Fn(&WorkflowState) -> String + Send + Sync + 'static>;

/// The single outgoing edge of a node.
#[derive(Clone)]
pub enum Successor {
    /// Unconditional edge to another node.
    Node(NodeId),
    /// Terminal edge: the workflow completes after this node.
    End,
    /// Conditional edge computed by a router over current state.
    Router(RouterFn),
}

impl fmt::Debug for Successor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Successor::Node(id) => f.debug_tuple("Node").field(id).finish(),
            Successor::End => write!(f, "End"),
            Successor::Router(_) => write!(f, "Router(..)"),
        }
    }
}

/// Declarative intent → node-name table with a default terminal target.
///
/// This is the entry point's conditional edge expressed as data: the
/// classified `intent` selects the domain node registered for it, and
/// anything unrecognized deterministically routes to the default (the
/// `response_generator` terminal node in the stock dispatch graph).
///
/// # Examples
///
/// ```
/// use dispatchflow::graph::IntentRoutes;
///
/// let router = IntentRoutes::new("response_generator")
///     .route("selection", "planning")
///     .route("communication", "notify_gate")
///     .into_router();
/// ```
#[derive(Clone, Debug)]
pub struct IntentRoutes {
    routes: FxHashMap<String, String>,
    default_target: String,
}

impl IntentRoutes {
    pub fn new(default_target: impl Into<String>) -> Self {
        Self {
            routes: FxHashMap::default(),
            default_target: default_target.into(),
        }
    }

    /// Register the domain node handling `intent`.
    #[must_use]
    pub fn route(mut self, intent: impl Into<String>, target: impl Into<String>) -> Self {
        self.routes.insert(intent.into(), target.into());
        self
    }

    /// Compile the table into a [`RouterFn`].
    pub fn into_router(self) -> RouterFn {
        Arc::new(move |state: &WorkflowState| {
            state
                .intent
                .as_deref()
                .and_then(|intent| self.routes.get(intent))
                .cloned()
                .unwrap_or_else(|| self.default_target.clone())
        })
    }
}

/// Router for the edge out of an approval gate: the recorded decision -
/// not the topology - picks the path.
///
/// An unresolved gate routes to the declined target; the executor only
/// re-resolves this edge after folding a decision in, so that branch is
/// the safe one.
pub fn approval_router(
    on_approved: impl Into<String>,
    on_declined: impl Into<String>,
) -> RouterFn {
    let on_approved = on_approved.into();
    let on_declined = on_declined.into();
    Arc::new(move |state: &WorkflowState| {
        let approved = state
            .approval
            .as_ref()
            .and_then(|gate| gate.approved)
            .unwrap_or(false);
        if approved {
            on_approved.clone()
        } else {
            on_declined.clone()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ApprovalGate, PendingAction, WorkflowState};
    use serde_json::json;

    fn state_with_intent(intent: Option<&str>) -> WorkflowState {
        let mut state = WorkflowState::builder().session("s").build();
        state.intent = intent.map(str::to_string);
        state
    }

    #[test]
    fn intent_routes_select_registered_target() {
        let router = IntentRoutes::new("response_generator")
            .route("selection", "planning")
            .into_router();
        assert_eq!(router(&state_with_intent(Some("selection"))), "planning");
    }

    #[test]
    fn unrecognized_and_missing_intents_hit_default() {
        let router = IntentRoutes::new("response_generator")
            .route("selection", "planning")
            .into_router();
        assert_eq!(
            router(&state_with_intent(Some("smalltalk"))),
            "response_generator"
        );
        assert_eq!(router(&state_with_intent(None)), "response_generator");
    }

    #[test]
    fn approval_router_follows_decision() {
        let router = approval_router("send_notification", "response_generator");
        let mut state = state_with_intent(Some("communication"));
        state.approval = Some(ApprovalGate {
            requires_approval: false,
            approval_type: "sms".into(),
            pending_action: PendingAction::new("a", "bulk_sms", json!({})),
            approved: Some(true),
            prompt: String::new(),
        });
        assert_eq!(router(&state), "send_notification");
        state.approval.as_mut().unwrap().approved = Some(false);
        assert_eq!(router(&state), "response_generator");
        state.approval = None;
        assert_eq!(router(&state), "response_generator");
    }
}
