//! End-to-end executor behavior: the two dispatch scenarios, the
//! approval-suspension protocol, and the failure taxonomy.

mod common;

use std::sync::Arc;

use dispatchflow::errors::ErrorScope;
use dispatchflow::graph::{GraphBuilder, RouterFn};
use dispatchflow::intent::FALLBACK_CONFIDENCE;
use dispatchflow::runtime::{Checkpoint, CheckpointStore, Executor, ExecutorError, InMemoryStore};
use dispatchflow::state::WorkflowState;
use dispatchflow::types::{NodeId, WorkflowStatus};

use common::fixtures::{dispatch_harness, request, FailingClassifier, ScriptedClassifier};
use common::nodes::{FailingNode, NoDriversNode, Passthrough, RogueNode};

#[tokio::test]
async fn selection_scenario_completes_with_twenty_drivers() {
    let harness = dispatch_harness(Arc::new(ScriptedClassifier));

    let outcome = harness
        .executor
        .advance("S1", request("give me 20 drivers"))
        .await
        .unwrap();

    assert_eq!(outcome.status, WorkflowStatus::Completed);
    assert!(!outcome.requires_approval);
    assert_eq!(outcome.response_text, "Selected 20 drivers.");
    let drivers = outcome.response_data.get("drivers").unwrap();
    assert_eq!(drivers.as_array().unwrap().len(), 20);
    assert!(outcome.errors.is_empty());

    let checkpoint = harness.store.load("S1").await.unwrap().unwrap();
    assert_eq!(checkpoint.status, WorkflowStatus::Completed);
    assert_eq!(checkpoint.state.intent.as_deref(), Some("selection"));
    assert_eq!(checkpoint.state.confidence, Some(0.9));
    assert_eq!(
        checkpoint.state.node_history,
        vec!["classify", "planning", "response_generator"]
    );
}

#[tokio::test]
async fn communication_scenario_suspends_then_declines() {
    let harness = dispatch_harness(Arc::new(ScriptedClassifier));

    let outcome = harness
        .executor
        .advance("S2", request("notify all drivers about shift change"))
        .await
        .unwrap();

    assert_eq!(outcome.status, WorkflowStatus::Suspended);
    assert!(outcome.requires_approval);
    assert_eq!(
        outcome.approval_prompt.as_deref(),
        Some("Send this SMS to all drivers?")
    );

    let checkpoint = harness.store.load("S2").await.unwrap().unwrap();
    assert_eq!(checkpoint.status, WorkflowStatus::Suspended);
    assert_eq!(checkpoint.current_node, NodeId::named("notify_gate"));
    let gate = checkpoint.state.approval.as_ref().unwrap();
    assert!(gate.requires_approval);
    assert_eq!(gate.approval_type, "sms");
    assert_eq!(gate.approved, None);

    // Nothing sent before the decision.
    assert_eq!(harness.gateway.sent_count(), 0);

    let resolved = harness.executor.resume("S2", false).await.unwrap();
    assert_eq!(resolved.status, WorkflowStatus::Completed);
    assert!(!resolved.requires_approval);
    assert!(resolved.response_text.contains("cancelled"));
    assert_eq!(harness.gateway.sent_count(), 0);

    let done = harness.store.load("S2").await.unwrap().unwrap();
    assert_eq!(
        done.state.node_history,
        vec!["classify", "notify_gate", "response_generator"]
    );
}

#[tokio::test]
async fn approved_action_executes_exactly_once() {
    let harness = dispatch_harness(Arc::new(ScriptedClassifier));

    harness
        .executor
        .advance("S3", request("notify all drivers about shift change"))
        .await
        .unwrap();

    let resolved = harness.executor.resume("S3", true).await.unwrap();
    assert_eq!(resolved.status, WorkflowStatus::Completed);
    assert_eq!(harness.gateway.sent_count(), 1);
    assert!(harness.gateway.was_delivered("act-S3"));
    let notification = resolved.response_data.get("notification").unwrap();
    assert_eq!(notification["action_id"], "act-S3");
    assert_eq!(notification["accepted"], true);

    // Retried resume never re-executes the gated action.
    let err = harness.executor.resume("S3", true).await.unwrap_err();
    assert!(matches!(err, ExecutorError::AlreadyResolved { .. }));
    assert_eq!(harness.gateway.sent_count(), 1);

    let done = harness.store.load("S3").await.unwrap().unwrap();
    assert_eq!(
        done.state.node_history,
        vec![
            "classify",
            "notify_gate",
            "send_notification",
            "response_generator"
        ]
    );
}

#[tokio::test]
async fn new_message_while_suspended_is_rejected() {
    let harness = dispatch_harness(Arc::new(ScriptedClassifier));
    harness
        .executor
        .advance("S4", request("notify all drivers about shift change"))
        .await
        .unwrap();

    let err = harness
        .executor
        .advance("S4", request("actually, also find me drivers"))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::AwaitingApproval { .. }));

    // The pending gate is untouched.
    let checkpoint = harness.store.load("S4").await.unwrap().unwrap();
    assert_eq!(checkpoint.status, WorkflowStatus::Suspended);
}

#[tokio::test]
async fn terminal_sessions_are_never_reentered() {
    let harness = dispatch_harness(Arc::new(ScriptedClassifier));
    harness
        .executor
        .advance("S5", request("give me 5 drivers"))
        .await
        .unwrap();

    let err = harness
        .executor
        .advance("S5", request("one more thing"))
        .await
        .unwrap_err();
    match err {
        ExecutorError::SessionClosed { status, .. } => {
            assert_eq!(status, WorkflowStatus::Completed);
        }
        other => panic!("expected SessionClosed, got {other:?}"),
    }
}

#[tokio::test]
async fn resume_on_unknown_or_unsuspended_sessions() {
    let harness = dispatch_harness(Arc::new(ScriptedClassifier));

    let err = harness.executor.resume("ghost", true).await.unwrap_err();
    assert!(matches!(err, ExecutorError::NoSuchSession { .. }));

    // A session that completed without ever suspending is also "no such
    // suspended session", not "already resolved".
    harness
        .executor
        .advance("S6", request("give me 3 drivers"))
        .await
        .unwrap();
    let err = harness.executor.resume("S6", true).await.unwrap_err();
    assert!(matches!(err, ExecutorError::NoSuchSession { .. }));
}

#[tokio::test]
async fn unrecognized_intent_routes_to_default_terminal() {
    let harness = dispatch_harness(Arc::new(ScriptedClassifier));
    let outcome = harness
        .executor
        .advance("S7", request("what's the weather like"))
        .await
        .unwrap();

    assert_eq!(outcome.status, WorkflowStatus::Completed);
    assert!(!outcome.response_text.is_empty());

    let checkpoint = harness.store.load("S7").await.unwrap().unwrap();
    assert_eq!(
        checkpoint.state.node_history,
        vec!["classify", "response_generator"]
    );
}

#[tokio::test]
async fn degraded_classifier_falls_back_without_failing() {
    let harness = dispatch_harness(Arc::new(FailingClassifier));
    let outcome = harness
        .executor
        .advance("S8", request("give me 20 drivers"))
        .await
        .unwrap();

    // The heuristic still classified and the workflow still completed.
    assert_eq!(outcome.status, WorkflowStatus::Completed);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].scope, ErrorScope::Classifier);

    let checkpoint = harness.store.load("S8").await.unwrap().unwrap();
    assert_eq!(checkpoint.state.intent.as_deref(), Some("selection"));
    assert_eq!(checkpoint.state.confidence, Some(FALLBACK_CONFIDENCE));
}

#[tokio::test]
async fn domain_error_terminates_normally() {
    let store = Arc::new(InMemoryStore::new());
    let graph = GraphBuilder::new()
        .add_node("planning", NoDriversNode)
        .set_entry("planning")
        .add_edge("planning", "End")
        .compile()
        .unwrap();
    let executor = Executor::new(Arc::new(graph), Arc::clone(&store) as _);

    let outcome = executor
        .advance("S9", request("find drivers in antarctica"))
        .await
        .unwrap();
    assert_eq!(outcome.status, WorkflowStatus::Completed);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.response_text.contains("No drivers match"));
}

#[tokio::test]
async fn node_failure_marks_failed_with_best_effort_response() {
    let store = Arc::new(InMemoryStore::new());
    let graph = GraphBuilder::new()
        .add_node("scoring", FailingNode)
        .set_entry("scoring")
        .add_edge("scoring", "End")
        .compile()
        .unwrap();
    let executor = Executor::new(Arc::new(graph), Arc::clone(&store) as _);

    let outcome = executor
        .advance("S10", request("score these drivers"))
        .await
        .unwrap();
    assert_eq!(outcome.status, WorkflowStatus::Failed);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].message.contains("scoring_service"));

    let checkpoint = store.load("S10").await.unwrap().unwrap();
    assert_eq!(checkpoint.status, WorkflowStatus::Failed);
    assert_eq!(checkpoint.state.node_history, vec!["scoring"]);

    // Failed is terminal.
    let err = executor
        .advance("S10", request("try again"))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::SessionClosed { .. }));
}

#[tokio::test]
async fn unknown_router_target_fails_the_workflow() {
    let store = Arc::new(InMemoryStore::new());
    let to_ghost: RouterFn = Arc::new(|_| "ghost".to_string());
    let graph = GraphBuilder::new()
        .add_node("classify", Passthrough)
        .set_entry("classify")
        .add_router("classify", to_ghost)
        .compile()
        .unwrap();
    let executor = Executor::new(Arc::new(graph), Arc::clone(&store) as _);

    let err = executor
        .advance("S11", request("anything"))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::Routing(_)));

    let checkpoint = store.load("S11").await.unwrap().unwrap();
    assert_eq!(checkpoint.status, WorkflowStatus::Failed);
    assert!(!checkpoint.state.errors.is_empty());
}

#[tokio::test]
async fn undeclared_write_fails_with_schema_error() {
    let store = Arc::new(InMemoryStore::new());
    let graph = GraphBuilder::new()
        .add_node("rogue", RogueNode)
        .set_entry("rogue")
        .add_edge("rogue", "End")
        .compile()
        .unwrap();
    let executor = Executor::new(Arc::new(graph), Arc::clone(&store) as _);

    let err = executor
        .advance("S12", request("anything"))
        .await
        .unwrap_err();
    match err {
        ExecutorError::Schema(schema) => {
            assert_eq!(schema.key, "surprise");
            assert_eq!(schema.node, "rogue");
        }
        other => panic!("expected Schema, got {other:?}"),
    }
    let checkpoint = store.load("S12").await.unwrap().unwrap();
    assert_eq!(checkpoint.status, WorkflowStatus::Failed);
}

#[tokio::test]
async fn cyclic_routing_is_bounded_by_step_budget() {
    let store = Arc::new(InMemoryStore::new());
    let graph = GraphBuilder::new()
        .add_node("a", Passthrough)
        .add_node("b", Passthrough)
        .set_entry("a")
        .add_edge("a", "b")
        .add_edge("b", "a")
        .compile()
        .unwrap();
    let executor = Executor::new(Arc::new(graph), Arc::clone(&store) as _);

    let err = executor
        .advance("S13", request("loop forever"))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::StepBudgetExceeded { .. }));
    let checkpoint = store.load("S13").await.unwrap().unwrap();
    assert_eq!(checkpoint.status, WorkflowStatus::Failed);
}

#[tokio::test]
async fn interrupted_running_session_continues_from_checkpoint() {
    let harness = dispatch_harness(Arc::new(ScriptedClassifier));

    // Simulate a crash that persisted position at "planning" but never
    // finished the call.
    let mut state = WorkflowState::builder()
        .org("org-1")
        .user("dispatcher-7")
        .conversation("conv-42")
        .session("S14")
        .user_message("give me 4 drivers")
        .build();
    state.intent = Some("selection".into());
    state.confidence = Some(0.9);
    state.params.insert("count".into(), serde_json::json!(4));
    state.node_history.push("classify".into());
    let checkpoint = Checkpoint {
        session_id: "S14".into(),
        version: 2,
        status: WorkflowStatus::Running,
        current_node: NodeId::named("planning"),
        state,
        updated_at: chrono::Utc::now(),
    };
    harness
        .store
        .compare_and_swap(None, &checkpoint)
        .await
        .unwrap();

    let outcome = harness
        .executor
        .advance("S14", request("still waiting"))
        .await
        .unwrap();
    assert_eq!(outcome.status, WorkflowStatus::Completed);
    assert_eq!(outcome.response_text, "Selected 4 drivers.");

    let done = harness.store.load("S14").await.unwrap().unwrap();
    // History continues from the persisted position; "classify" never
    // re-ran.
    assert_eq!(
        done.state.node_history,
        vec!["classify", "planning", "response_generator"]
    );
    // The new message was folded into the bounded history.
    assert_eq!(
        done.state.latest_user_message().unwrap().content,
        "still waiting"
    );
}

#[tokio::test]
async fn graph_info_exposes_nodes_and_version() {
    let harness = dispatch_harness(Arc::new(ScriptedClassifier));
    let info = harness.executor.graph_info();
    assert_eq!(info.entry, "classify");
    assert!(info.nodes.contains(&"send_notification".to_string()));
    assert_eq!(info.nodes.len(), 5);
    assert_ne!(info.version, 0);

    let sessions = harness.executor.list_sessions().await.unwrap();
    assert!(sessions.is_empty());
}
