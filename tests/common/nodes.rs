//! Shared test nodes standing in for the dispatch application's domain
//! logic.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use dispatchflow::errors::ErrorEvent;
use dispatchflow::node::{
    ApprovalRequest, Node, NodeContext, NodeError, NodeOutput, StateUpdate,
};
use dispatchflow::state::{PendingAction, WorkflowState};

/// Selects drivers for the request; count comes from extracted params
/// (default 20).
pub struct PlanningNode;

#[async_trait]
impl Node for PlanningNode {
    fn declared_keys(&self) -> &'static [&'static str] {
        &["drivers"]
    }

    async fn run(
        &self,
        snapshot: WorkflowState,
        _ctx: NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let count = snapshot
            .params
            .get("count")
            .and_then(|v| v.as_u64())
            .unwrap_or(20) as usize;
        let drivers: Vec<_> = (1..=count)
            .map(|i| json!({"id": format!("drv-{i:02}"), "score": 1.0 - (i as f64 / 100.0)}))
            .collect();
        let update = StateUpdate::new()
            .with_context_entry("drivers", json!(drivers))
            .with_response_entry("drivers", json!(drivers))
            .with_response_text(format!("Selected {count} drivers."));
        Ok(NodeOutput::advance(update))
    }
}

/// Prepares a bulk SMS and suspends for approval.
pub struct CommunicationNode;

#[async_trait]
impl Node for CommunicationNode {
    async fn run(
        &self,
        snapshot: WorkflowState,
        ctx: NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let body = snapshot
            .latest_user_message()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let request = ApprovalRequest {
            approval_type: "sms".to_string(),
            pending_action: PendingAction::new(
                format!("act-{}", ctx.session_id),
                "bulk_sms",
                json!({"body": body}),
            ),
            prompt: "Send this SMS to all drivers?".to_string(),
        };
        Ok(NodeOutput::suspend(StateUpdate::new(), request))
    }
}

/// Infrastructure failure: the collaborator is down.
pub struct FailingNode;

#[async_trait]
impl Node for FailingNode {
    async fn run(&self, _: WorkflowState, _: NodeContext) -> Result<NodeOutput, NodeError> {
        Err(NodeError::Collaborator {
            collaborator: "scoring_service",
            message: "connection refused".to_string(),
        })
    }
}

/// Domain-level recoverable condition: records the error and still
/// terminates normally.
pub struct NoDriversNode;

#[async_trait]
impl Node for NoDriversNode {
    async fn run(
        &self,
        _snapshot: WorkflowState,
        ctx: NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let update = StateUpdate::new()
            .with_errors(vec![ErrorEvent::node(
                &ctx.node,
                "no drivers match the requested criteria",
            )
            .with_details(json!({"matched": 0}))])
            .with_response_text("No drivers match those criteria right now.");
        Ok(NodeOutput::advance(update))
    }
}

/// Writes a context key it never declared; trips the schema check.
pub struct RogueNode;

#[async_trait]
impl Node for RogueNode {
    fn declared_keys(&self) -> &'static [&'static str] {
        &["plan"]
    }

    async fn run(&self, _: WorkflowState, _: NodeContext) -> Result<NodeOutput, NodeError> {
        Ok(NodeOutput::advance(
            StateUpdate::new().with_context_entry("surprise", json!(true)),
        ))
    }
}

/// Sleeps long enough for concurrent calls to overlap, then advances.
pub struct SlowNode {
    pub delay: Duration,
}

#[async_trait]
impl Node for SlowNode {
    async fn run(&self, _: WorkflowState, _: NodeContext) -> Result<NodeOutput, NodeError> {
        tokio::time::sleep(self.delay).await;
        Ok(NodeOutput::advance(
            StateUpdate::new().with_response_text("slow work done"),
        ))
    }
}

/// Does nothing; useful for topology-only graphs.
pub struct Passthrough;

#[async_trait]
impl Node for Passthrough {
    async fn run(&self, _: WorkflowState, _: NodeContext) -> Result<NodeOutput, NodeError> {
        Ok(NodeOutput::advance(StateUpdate::new()))
    }
}
