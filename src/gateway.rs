//! Notification gateway collaborator and the gated-action node.
//!
//! The gateway is the irreversible side effect behind the approval gate.
//! Two layers guarantee at-most-once execution:
//!
//! 1. [`NotificationNode`] refuses to run without an approved gate and
//!    skips the send when `response_data` already records a delivery for
//!    the same [`PendingAction::id`] (crash-recovery re-execution).
//! 2. [`NotificationGateway`] implementations must de-duplicate on the
//!    action id, tolerating the at-least-once delivery the engine's
//!    retry semantics can produce.

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::{json, Value};
use std::sync::Mutex;
use thiserror::Error;

use crate::errors::ErrorEvent;
use crate::node::{Node, NodeContext, NodeError, NodeOutput, StateUpdate};
use crate::state::{PendingAction, WorkflowState};

/// Response-data key under which deliveries are recorded.
pub const NOTIFICATION_KEY: &str = "notification";

/// Outcome of handing a pending action to the gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryResult {
    pub action_id: String,
    pub accepted: bool,
    pub detail: String,
}

/// Hard failures from the gateway transport.
#[derive(Debug, Error, Diagnostic)]
pub enum GatewayError {
    #[error("notification gateway unreachable: {message}")]
    #[diagnostic(code(dispatchflow::gateway::unreachable))]
    Unreachable { message: String },

    #[error("notification gateway call timed out")]
    #[diagnostic(code(dispatchflow::gateway::timeout))]
    Timeout,
}

/// External delivery collaborator.
///
/// `send` must be idempotent for a given [`PendingAction::id`]: repeated
/// calls with the same id are a single logical delivery.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(&self, action: &PendingAction) -> Result<DeliveryResult, GatewayError>;
}

/// In-process gateway for tests and demos.
///
/// De-duplicates on action id and counts *physical* sends, which is what
/// the at-most-once tests assert on.
#[derive(Debug, Default)]
pub struct MemoryNotificationGateway {
    delivered: Mutex<FxHashMap<String, DeliveryResult>>,
}

impl MemoryNotificationGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct actions physically delivered.
    pub fn sent_count(&self) -> usize {
        self.delivered.lock().expect("gateway poisoned").len()
    }

    pub fn was_delivered(&self, action_id: &str) -> bool {
        self.delivered
            .lock()
            .expect("gateway poisoned")
            .contains_key(action_id)
    }
}

#[async_trait]
impl NotificationGateway for MemoryNotificationGateway {
    async fn send(&self, action: &PendingAction) -> Result<DeliveryResult, GatewayError> {
        let mut delivered = self.delivered.lock().expect("gateway poisoned");
        if let Some(existing) = delivered.get(&action.id) {
            return Ok(existing.clone());
        }
        let result = DeliveryResult {
            action_id: action.id.clone(),
            accepted: true,
            detail: format!("{} delivered", action.kind),
        };
        delivered.insert(action.id.clone(), result.clone());
        Ok(result)
    }
}

/// Executes the approved pending action through the gateway.
///
/// Reachable only via the approval router's approved branch; running it
/// with anything but `approved == Some(true)` records a domain error and
/// sends nothing. A delivery already recorded for the same action id is
/// reported without re-sending.
pub struct NotificationNode {
    gateway: std::sync::Arc<dyn NotificationGateway>,
}

impl NotificationNode {
    pub fn new(gateway: std::sync::Arc<dyn NotificationGateway>) -> Self {
        Self { gateway }
    }

    fn recorded_delivery<'a>(snapshot: &'a WorkflowState, action_id: &str) -> Option<&'a Value> {
        snapshot
            .response_data
            .get(NOTIFICATION_KEY)
            .filter(|entry| entry.get("action_id").and_then(Value::as_str) == Some(action_id))
    }
}

#[async_trait]
impl Node for NotificationNode {
    fn declared_keys(&self) -> &'static [&'static str] {
        &[NOTIFICATION_KEY]
    }

    async fn run(
        &self,
        snapshot: WorkflowState,
        ctx: NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let gate = snapshot.approval.as_ref().ok_or(NodeError::MissingInput {
            what: "approval gate",
        })?;

        if gate.approved != Some(true) {
            // Mis-route, not an outage: record it and terminate normally.
            let update = StateUpdate::new()
                .with_errors(vec![ErrorEvent::node(
                    &ctx.node,
                    "notification node reached without an approved gate; nothing sent",
                )])
                .with_response_text("The pending action was not approved, so nothing was sent.");
            return Ok(NodeOutput::advance(update));
        }

        let action = &gate.pending_action;
        if Self::recorded_delivery(&snapshot, &action.id).is_some() {
            ctx.emit(format!("delivery for action {} already recorded, skipping", action.id))?;
            return Ok(NodeOutput::advance(StateUpdate::new()));
        }

        let result = self.gateway.send(action).await.map_err(|err| {
            NodeError::Collaborator {
                collaborator: "notification_gateway",
                message: err.to_string(),
            }
        })?;

        ctx.emit(format!(
            "action {} dispatched via {} gateway (accepted={})",
            result.action_id, gate.approval_type, result.accepted
        ))?;

        let mut update = StateUpdate::new().with_response_entry(
            NOTIFICATION_KEY,
            json!({
                "action_id": result.action_id,
                "accepted": result.accepted,
                "detail": result.detail,
            }),
        );
        if result.accepted {
            update = update.with_response_text(format!(
                "Notification sent ({}).",
                gate.approval_type
            ));
        } else {
            update = update
                .with_errors(vec![ErrorEvent::tool(
                    "notification_gateway",
                    format!("delivery rejected: {}", result.detail),
                )
                .with_details(json!({"action_id": action.id}))])
                .with_response_text("The gateway rejected the notification.");
        }
        Ok(NodeOutput::advance(update))
    }
}
