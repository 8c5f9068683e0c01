//! End-to-end demo: both dispatch scenarios against the in-memory store.
//!
//! Run with: `cargo run --example dispatch_demo`

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use dispatchflow::gateway::{MemoryNotificationGateway, NotificationNode};
use dispatchflow::graph::{approval_router, GraphBuilder, IntentRoutes};
use dispatchflow::intent::{ClassifierNode, HeuristicClassifier};
use dispatchflow::node::{
    ApprovalRequest, Node, NodeContext, NodeError, NodeOutput, StateUpdate,
};
use dispatchflow::respond::{ResponseGeneratorNode, RESPONSE_GENERATOR};
use dispatchflow::runtime::{AdvanceRequest, Executor, InMemoryStore};
use dispatchflow::state::{PendingAction, WorkflowState};
use dispatchflow::telemetry;
use dispatchflow::utils::ids::IdGenerator;

/// Demo driver-selection node: fabricates a scored roster.
struct PlanningNode;

#[async_trait]
impl Node for PlanningNode {
    fn declared_keys(&self) -> &'static [&'static str] {
        &["drivers"]
    }

    async fn run(
        &self,
        snapshot: WorkflowState,
        ctx: NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let count = snapshot
            .params
            .get("count")
            .and_then(|v| v.as_u64())
            .unwrap_or(20) as usize;
        ctx.emit(format!("selecting {count} drivers"))?;
        let drivers: Vec<_> = (1..=count)
            .map(|i| json!({"id": format!("drv-{i:02}")}))
            .collect();
        Ok(NodeOutput::advance(
            StateUpdate::new()
                .with_context_entry("drivers", json!(drivers))
                .with_response_entry("drivers", json!(drivers))
                .with_response_text(format!("Selected {count} drivers.")),
        ))
    }
}

/// Demo communication node: stages a bulk SMS behind the approval gate.
struct CommunicationNode;

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
        ctx.emit("staging bulk SMS for approval")?;
        let request = ApprovalRequest {
            approval_type: "sms".into(),
            pending_action: PendingAction::new(
                format!("act-{}", ctx.session_id),
                "bulk_sms",
                json!({"body": body}),
            ),
            prompt: "Send this SMS to all drivers?".into(),
        };
        Ok(NodeOutput::suspend(StateUpdate::new(), request))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_tracing();

    let gateway = Arc::new(MemoryNotificationGateway::new());
    let graph = GraphBuilder::new()
        .add_node(
            "classify",
            ClassifierNode::new(Arc::new(HeuristicClassifier::default())),
        )
        .add_node("planning", PlanningNode)
        .add_node("notify_gate", CommunicationNode)
        .add_node(
            "send_notification",
            NotificationNode::new(Arc::clone(&gateway) as _),
        )
        .add_node(RESPONSE_GENERATOR, ResponseGeneratorNode)
        .set_entry("classify")
        .add_router(
            "classify",
            IntentRoutes::new(RESPONSE_GENERATOR)
                .route("selection", "planning")
                .route("communication", "notify_gate")
                .into_router(),
        )
        .add_edge("planning", RESPONSE_GENERATOR)
        .add_router(
            "notify_gate",
            approval_router("send_notification", RESPONSE_GENERATOR),
        )
        .add_edge("send_notification", RESPONSE_GENERATOR)
        .add_edge(RESPONSE_GENERATOR, "End")
        .compile()?;

    let executor = Executor::new(Arc::new(graph), Arc::new(InMemoryStore::new()));
    executor.start_event_listener();

    let info = executor.graph_info();
    println!(
        "graph: entry={} nodes={:?} version={:#x}\n",
        info.entry, info.nodes, info.version
    );

    let ids = IdGenerator::new();

    // Scenario 1: driver selection, straight through to completion.
    let s1 = ids.generate_session_id();
    let outcome = executor
        .advance(
            &s1,
            AdvanceRequest::new("org-1", "dispatcher-7", "conv-1", "give me 20 drivers"),
        )
        .await?;
    println!("[{s1}] {} -> {}", outcome.status, outcome.response_text);

    // Scenario 2: bulk notification behind the approval gate.
    let s2 = ids.generate_session_id();
    let outcome = executor
        .advance(
            &s2,
            AdvanceRequest::new(
                "org-1",
                "dispatcher-7",
                "conv-2",
                "notify all drivers about the shift change",
            ),
        )
        .await?;
    println!(
        "[{s2}] {} -> approval needed: {}",
        outcome.status,
        outcome.approval_prompt.as_deref().unwrap_or("-")
    );

    let resolved = executor.resume(&s2, true).await?;
    println!(
        "[{s2}] {} -> {} (gateway sends: {})",
        resolved.status,
        resolved.response_text,
        gateway.sent_count()
    );

    if !resolved.errors.is_empty() {
        eprintln!("{}", telemetry::pretty_print(&resolved.errors));
    }

    Ok(())
}
