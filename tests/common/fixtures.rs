//! Graph and executor fixtures shared across integration tests.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::json;
use std::sync::Arc;

use dispatchflow::gateway::{MemoryNotificationGateway, NotificationNode};
use dispatchflow::graph::{approval_router, GraphBuilder, IntentRoutes, WorkflowGraph};
use dispatchflow::intent::{
    Classification, ClassifierError, ClassifierNode, IntentClassifier,
};
use dispatchflow::message::Message;
use dispatchflow::respond::{ResponseGeneratorNode, RESPONSE_GENERATOR};
use dispatchflow::runtime::{AdvanceRequest, Executor, InMemoryStore};

use super::nodes::{CommunicationNode, PlanningNode};

/// Deterministic stand-in for the external intent classifier.
pub struct ScriptedClassifier;

#[async_trait]
impl IntentClassifier for ScriptedClassifier {
    async fn classify(
        &self,
        message: &str,
        _history: &[Message],
    ) -> Result<Classification, ClassifierError> {
        let lowered = message.to_lowercase();
        let mut params = FxHashMap::default();
        if lowered.contains("notify") {
            return Ok(Classification {
                intent: "communication".into(),
                confidence: 0.85,
                params,
            });
        }
        if lowered.contains("driver") {
            if let Some(count) = lowered
                .split_whitespace()
                .find_map(|w| w.parse::<u64>().ok())
            {
                params.insert("count".to_string(), json!(count));
            }
            return Ok(Classification {
                intent: "selection".into(),
                confidence: 0.9,
                params,
            });
        }
        Ok(Classification {
            intent: "general".into(),
            confidence: 0.5,
            params,
        })
    }
}

/// Classifier that is always down, forcing the heuristic fallback.
pub struct FailingClassifier;

#[async_trait]
impl IntentClassifier for FailingClassifier {
    async fn classify(
        &self,
        _message: &str,
        _history: &[Message],
    ) -> Result<Classification, ClassifierError> {
        Err(ClassifierError::Unavailable {
            message: "upstream 503".into(),
        })
    }
}

/// The stock dispatch graph from the scenarios: classification, driver
/// selection, approval-gated bulk notification, default response.
pub fn dispatch_graph(
    classifier: Arc<dyn IntentClassifier>,
    gateway: Arc<MemoryNotificationGateway>,
) -> Arc<WorkflowGraph> {
    let graph = GraphBuilder::new()
        .add_node("classify", ClassifierNode::new(classifier))
        .add_node("planning", PlanningNode)
        .add_node("notify_gate", CommunicationNode)
        .add_node("send_notification", NotificationNode::new(gateway))
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
        .compile()
        .expect("dispatch graph is valid");
    Arc::new(graph)
}

/// Executor + shared store + shared gateway for one test.
pub struct DispatchHarness {
    pub executor: Executor,
    pub store: Arc<InMemoryStore>,
    pub gateway: Arc<MemoryNotificationGateway>,
}

pub fn dispatch_harness(classifier: Arc<dyn IntentClassifier>) -> DispatchHarness {
    let store = Arc::new(InMemoryStore::new());
    let gateway = Arc::new(MemoryNotificationGateway::new());
    let graph = dispatch_graph(classifier, Arc::clone(&gateway));
    let executor = Executor::new(graph, Arc::clone(&store) as _);
    DispatchHarness {
        executor,
        store,
        gateway,
    }
}

/// Standard request body for a session.
pub fn request(message: &str) -> AdvanceRequest {
    AdvanceRequest::new("org-1", "dispatcher-7", "conv-42", message)
}
