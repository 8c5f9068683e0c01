//! Intent classification and the router node.
//!
//! [`ClassifierNode`] is the special node at the graph entry: it turns
//! the latest user message into an intent, a confidence score, and
//! extracted parameters. It always terminates and always produces a
//! non-null intent - when the external classifier collaborator is
//! degraded, it falls back to the deterministic [`HeuristicClassifier`]
//! and records the degradation as a non-fatal error instead of failing
//! the workflow.

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::{json, Value};
use thiserror::Error;
use std::sync::Arc;

use crate::errors::ErrorEvent;
use crate::message::Message;
use crate::node::{Node, NodeContext, NodeError, NodeOutput, StateUpdate};
use crate::state::WorkflowState;

/// Confidence sentinel assigned by the heuristic fallback. Deliberately
/// low so downstream consumers can distinguish degraded classifications.
pub const FALLBACK_CONFIDENCE: f64 = 0.3;

/// Result of classifying a user message.
#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    pub intent: String,
    /// `0.0..=1.0`.
    pub confidence: f64,
    pub params: FxHashMap<String, Value>,
}

/// Failures an external classifier collaborator may report.
///
/// These never cross the node boundary as workflow failures: the router
/// node absorbs them into the heuristic fallback.
#[derive(Debug, Error, Diagnostic)]
pub enum ClassifierError {
    #[error("classifier unavailable: {message}")]
    #[diagnostic(code(dispatchflow::intent::unavailable))]
    Unavailable { message: String },

    #[error("classifier returned malformed output: {message}")]
    #[diagnostic(code(dispatchflow::intent::malformed))]
    Malformed { message: String },

    #[error("classifier call timed out")]
    #[diagnostic(code(dispatchflow::intent::timeout))]
    Timeout,
}

/// External intent-classification collaborator.
///
/// Implementations must bound their own call latency and must not panic
/// for ordinary inputs; outages surface as [`ClassifierError`] and the
/// router falls back locally.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(
        &self,
        message: &str,
        history: &[Message],
    ) -> Result<Classification, ClassifierError>;
}

/// Deterministic keyword classifier used as the degraded-mode fallback
/// (and as a standalone classifier in tests and demos).
///
/// Rules are ordered; the first rule with a keyword hit wins. No rule
/// hit yields the default intent. Confidence is always the
/// [`FALLBACK_CONFIDENCE`] sentinel.
#[derive(Clone, Debug)]
pub struct HeuristicClassifier {
    rules: Vec<(String, Vec<String>)>,
    default_intent: String,
}

impl Default for HeuristicClassifier {
    /// Stock dispatch vocabulary: driver selection, bulk communication,
    /// compliance lookups.
    fn default() -> Self {
        Self::new("general")
            .rule("communication", &["notify", "message", "broadcast", "tell", "announce"])
            .rule("selection", &["driver", "drivers", "find", "assign", "candidates"])
            .rule("compliance", &["compliance", "hours", "violation", "inspection"])
    }
}

impl HeuristicClassifier {
    pub fn new(default_intent: impl Into<String>) -> Self {
        Self {
            rules: Vec::new(),
            default_intent: default_intent.into(),
        }
    }

    /// Append a rule mapping any of `keywords` (matched case-insensitively
    /// as substrings) to `intent`.
    #[must_use]
    pub fn rule(mut self, intent: impl Into<String>, keywords: &[&str]) -> Self {
        self.rules.push((
            intent.into(),
            keywords.iter().map(|k| k.to_lowercase()).collect(),
        ));
        self
    }

    /// Classify without I/O. Always succeeds.
    #[must_use]
    pub fn classify_local(&self, message: &str) -> Classification {
        let lowered = message.to_lowercase();
        let intent = self
            .rules
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k.as_str())))
            .map(|(intent, _)| intent.clone())
            .unwrap_or_else(|| self.default_intent.clone());
        let mut params = FxHashMap::default();
        // Pull the first integer literal out of the request, e.g.
        // "give me 20 drivers" -> count = 20.
        if let Some(count) = first_integer(&lowered) {
            params.insert("count".to_string(), json!(count));
        }
        Classification {
            intent,
            confidence: FALLBACK_CONFIDENCE,
            params,
        }
    }
}

fn first_integer(text: &str) -> Option<u64> {
    let mut digits = String::new();
    for ch in text.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
        } else if !digits.is_empty() {
            break;
        }
    }
    digits.parse().ok()
}

#[async_trait]
impl IntentClassifier for HeuristicClassifier {
    async fn classify(
        &self,
        message: &str,
        _history: &[Message],
    ) -> Result<Classification, ClassifierError> {
        Ok(self.classify_local(message))
    }
}

/// The router node: classifies the latest user message into routing
/// fields.
///
/// Contract: never suspends, always terminates, always yields a non-null
/// intent. A collaborator failure degrades to the heuristic and is
/// recorded as a classifier-scoped [`ErrorEvent`] so the outage is
/// observable without aborting the conversation.
pub struct ClassifierNode {
    classifier: Arc<dyn IntentClassifier>,
    fallback: HeuristicClassifier,
}

impl ClassifierNode {
    pub fn new(classifier: Arc<dyn IntentClassifier>) -> Self {
        Self {
            classifier,
            fallback: HeuristicClassifier::default(),
        }
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: HeuristicClassifier) -> Self {
        self.fallback = fallback;
        self
    }
}

#[async_trait]
impl Node for ClassifierNode {
    async fn run(
        &self,
        snapshot: WorkflowState,
        ctx: NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let message = snapshot
            .latest_user_message()
            .ok_or(NodeError::MissingInput {
                what: "user message",
            })?;

        let (classification, fallback_error) = match self
            .classifier
            .classify(&message.content, &snapshot.messages)
            .await
        {
            Ok(classification) => (classification, None),
            Err(err) => {
                tracing::warn!(error = %err, "intent classifier degraded, using heuristic");
                let event = ErrorEvent::classifier(format!(
                    "classifier degraded, heuristic fallback applied: {err}"
                ));
                (self.fallback.classify_local(&message.content), Some(event))
            }
        };

        ctx.emit(format!(
            "classified intent '{}' (confidence {:.2})",
            classification.intent, classification.confidence
        ))?;

        let mut update = StateUpdate::new()
            .with_intent(classification.intent, classification.confidence)
            .with_params(classification.params);
        if let Some(event) = fallback_error {
            update = update.with_errors(vec![event]);
        }
        Ok(NodeOutput::advance(update))
    }
}
