//! The default terminal node.
//!
//! `response_generator` is where every route that produced no richer
//! answer lands: unrecognized intents, declined approvals, and degraded
//! runs. It never suspends and never fails; at worst it acknowledges the
//! request generically.

use async_trait::async_trait;

use crate::node::{Node, NodeContext, NodeError, NodeOutput, StateUpdate};
use crate::state::WorkflowState;

/// Conventional registration name for the default terminal node.
pub const RESPONSE_GENERATOR: &str = "response_generator";

/// Builds the final response when no domain node already has.
///
/// Precedence: an existing `response_text` is kept untouched; a declined
/// approval yields a cancellation notice; recorded errors yield a
/// degraded-service notice; otherwise a generic acknowledgement of the
/// classified intent.
#[derive(Debug, Default)]
pub struct ResponseGeneratorNode;

#[async_trait]
impl Node for ResponseGeneratorNode {
    async fn run(
        &self,
        snapshot: WorkflowState,
        _ctx: NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let declined = snapshot
            .approval
            .as_ref()
            .is_some_and(|gate| gate.approved == Some(false));

        let text = if declined {
            "The pending action was cancelled; nothing was sent.".to_string()
        } else if snapshot.response_text.is_some() {
            // A domain node already answered.
            return Ok(NodeOutput::advance(StateUpdate::new()));
        } else if !snapshot.errors.is_empty() {
            format!(
                "I couldn't fully process that request ({} issue{} encountered). Please try again or rephrase.",
                snapshot.errors.len(),
                if snapshot.errors.len() == 1 { "" } else { "s" }
            )
        } else {
            match snapshot.intent.as_deref() {
                Some("general") | None => {
                    "I'm not sure how to help with that yet. Try asking about drivers, \
                     notifications, or compliance."
                        .to_string()
                }
                Some(intent) => format!("Understood, handled as a {intent} request."),
            }
        };

        Ok(NodeOutput::advance(StateUpdate::new().with_response_text(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorEvent;
    use crate::event_bus::EventBus;
    use crate::state::{ApprovalGate, PendingAction};
    use serde_json::json;

    fn ctx() -> NodeContext {
        NodeContext {
            node: RESPONSE_GENERATOR.into(),
            step: 0,
            session_id: "s-1".into(),
            event_sender: EventBus::default().get_emitter(),
        }
    }

    fn state() -> WorkflowState {
        WorkflowState::builder()
            .session("s-1")
            .user_message("hello there")
            .build()
    }

    #[tokio::test]
    async fn keeps_existing_response() {
        let mut snapshot = state();
        snapshot.response_text = Some("20 drivers selected.".into());
        let out = ResponseGeneratorNode.run(snapshot, ctx()).await.unwrap();
        assert!(out.update.response_text.is_none());
    }

    #[tokio::test]
    async fn declined_approval_wins_over_existing_response() {
        let mut snapshot = state();
        snapshot.response_text = Some("queued".into());
        snapshot.approval = Some(ApprovalGate {
            requires_approval: false,
            approval_type: "sms".into(),
            pending_action: PendingAction::new("a", "bulk_sms", json!({})),
            approved: Some(false),
            prompt: String::new(),
        });
        let out = ResponseGeneratorNode.run(snapshot, ctx()).await.unwrap();
        assert!(out
            .update
            .response_text
            .unwrap()
            .contains("cancelled"));
    }

    #[tokio::test]
    async fn errors_produce_degraded_notice() {
        let mut snapshot = state();
        snapshot.errors.push(ErrorEvent::classifier("fallback"));
        let out = ResponseGeneratorNode.run(snapshot, ctx()).await.unwrap();
        assert!(out.update.response_text.unwrap().contains("1 issue"));
    }

    #[tokio::test]
    async fn unknown_intent_gets_generic_acknowledgement() {
        let out = ResponseGeneratorNode.run(state(), ctx()).await.unwrap();
        assert!(out.update.response_text.unwrap().contains("not sure"));
    }
}
