//! The workflow executor: drives one instance from its entry node to
//! termination or suspension.
//!
//! Each [`advance`](Executor::advance)/[`resume`](Executor::resume) call
//! runs synchronously on the calling task - the executor spawns no
//! background workers, and a suspended workflow consumes no in-process
//! resource until its resume call arrives. Sessions execute fully in
//! parallel; the checkpoint store's compare-and-swap is the only
//! cross-call coordination.
//!
//! # Failure taxonomy
//!
//! Domain-level problems ride inside the state's `errors` list and never
//! abort the graph. [`ExecutorError`] covers everything that does abort
//! the call: caller-input errors on `resume`, concurrent-modification
//! losses, malformed routing, node-contract violations, and store
//! failures. A node's infrastructure failure marks the workflow `FAILED`
//! but still returns a best-effort [`AdvanceOutcome`] carrying the error
//! list.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

use crate::errors::ErrorEvent;
use crate::event_bus::{Event, EventBus};
use crate::graph::{GraphInfo, RoutingError, WorkflowGraph};
use crate::node::{NodeContext, NodeHint};
use crate::reducers::{apply_update, SchemaError};
use crate::runtime::store::{Checkpoint, CheckpointStore, StoreError};
use crate::state::{ApprovalGate, WorkflowState};
use crate::types::{NodeId, WorkflowStatus};

/// Upper bound on nodes executed per `advance`/`resume` call. A
/// well-formed dispatch graph finishes in a handful of steps; hitting
/// this bound means a router is cycling and the workflow fails instead
/// of looping.
pub const MAX_STEPS_PER_ADVANCE: usize = 32;

/// New-message input for [`Executor::advance`].
#[derive(Clone, Debug, Default)]
pub struct AdvanceRequest {
    pub org_id: String,
    pub user_id: String,
    pub conversation_id: String,
    pub message: String,
}

impl AdvanceRequest {
    pub fn new(
        org_id: impl Into<String>,
        user_id: impl Into<String>,
        conversation_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            org_id: org_id.into(),
            user_id: user_id.into(),
            conversation_id: conversation_id.into(),
            message: message.into(),
        }
    }
}

/// Caller-facing result of an `advance` or `resume` call.
#[derive(Clone, Debug)]
pub struct AdvanceOutcome {
    pub response_text: String,
    pub response_data: FxHashMap<String, Value>,
    pub requires_approval: bool,
    /// Present iff the call suspended at an approval gate.
    pub approval_prompt: Option<String>,
    pub status: WorkflowStatus,
    /// Non-fatal errors accumulated by the instance so far.
    pub errors: Vec<ErrorEvent>,
}

/// Fatal errors aborting an `advance`/`resume` call.
#[derive(Debug, Error, Diagnostic)]
pub enum ExecutorError {
    /// `resume` was called for a session that does not exist or is not
    /// suspended.
    #[error("no suspended session '{session_id}' to resume")]
    #[diagnostic(code(dispatchflow::executor::no_such_session))]
    NoSuchSession { session_id: String },

    /// `resume` was called a second time for the same suspension.
    #[error("approval for session '{session_id}' was already resolved")]
    #[diagnostic(code(dispatchflow::executor::already_resolved))]
    AlreadyResolved { session_id: String },

    /// A new message arrived while the session awaits approval.
    #[error("session '{session_id}' is awaiting approval; resolve it with resume()")]
    #[diagnostic(
        code(dispatchflow::executor::awaiting_approval),
        help("A pending human decision is never discarded; call resume() first.")
    )]
    AwaitingApproval { session_id: String },

    /// A new message arrived for a terminal session.
    #[error("session '{session_id}' is {status}; start a new session id for new work")]
    #[diagnostic(
        code(dispatchflow::executor::session_closed),
        help("Terminal instances are never re-entered - this prevents replay of stale approvals.")
    )]
    SessionClosed {
        session_id: String,
        status: WorkflowStatus,
    },

    /// This call lost the compare-and-swap race; another execution
    /// advanced the session. The caller retries against the now-current
    /// checkpoint.
    #[error("session '{session_id}' was advanced concurrently")]
    #[diagnostic(
        code(dispatchflow::executor::concurrent_modification),
        help("Reload and retry; exactly one concurrent call wins per round.")
    )]
    ConcurrentModification { session_id: String },

    /// Malformed routing (unknown router target); the workflow is FAILED.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Routing(#[from] RoutingError),

    /// The per-call step budget was exhausted; the workflow is FAILED.
    #[error("step budget of {limit} nodes exceeded; routing is cycling")]
    #[diagnostic(code(dispatchflow::executor::step_budget))]
    StepBudgetExceeded { limit: usize },

    /// A node wrote outside its declared contract; the workflow is FAILED.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    /// Checkpoint store failure; the checkpoint keeps its last-good
    /// content and a retry is safe.
    #[error(transparent)]
    #[diagnostic(code(dispatchflow::executor::store))]
    Store(#[from] StoreError),
}

/// Drives workflow instances over an immutable graph and a checkpoint
/// store.
///
/// The executor is cheap to share (`Arc`) and holds no per-session
/// state: everything an instance needs lives in its checkpoint.
///
/// # Examples
///
/// ```rust,no_run
/// use dispatchflow::graph::WorkflowGraph;
/// use dispatchflow::runtime::{AdvanceRequest, Executor, InMemoryStore};
/// use std::sync::Arc;
///
/// # async fn example(graph: Arc<WorkflowGraph>) -> Result<(), Box<dyn std::error::Error>> {
/// let executor = Executor::new(graph, Arc::new(InMemoryStore::new()));
///
/// let outcome = executor
///     .advance(
///         "sess-1",
///         AdvanceRequest::new("org-1", "dispatcher-7", "conv-42", "give me 20 drivers"),
///     )
///     .await?;
///
/// if outcome.requires_approval {
///     let resolved = executor.resume("sess-1", true).await?;
///     println!("{}", resolved.response_text);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Executor {
    graph: Arc<WorkflowGraph>,
    store: Arc<dyn CheckpointStore>,
    event_bus: EventBus,
}

impl Executor {
    pub fn new(graph: Arc<WorkflowGraph>, store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            graph,
            store,
            event_bus: EventBus::default(),
        }
    }

    /// Replace the default event bus with a preconfigured one.
    #[must_use]
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// Start draining engine events into the bus's sinks. Must be called
    /// from within a tokio runtime.
    pub fn start_event_listener(&self) {
        self.event_bus.listen_for_events();
    }

    /// Read-only diagnostics view of the graph this executor drives.
    #[must_use]
    pub fn graph_info(&self) -> GraphInfo {
        self.graph.info()
    }

    /// Session ids known to the underlying store (diagnostics).
    pub async fn list_sessions(&self) -> Result<Vec<String>, ExecutorError> {
        Ok(self.store.list_sessions().await?)
    }

    /// Advance a session with a new user message.
    ///
    /// Creates the instance on first contact; continues an interrupted
    /// `RUNNING` instance from its persisted position (the current node
    /// re-executes, which node idempotency makes safe). Suspended and
    /// terminal sessions are rejected - see [`ExecutorError`].
    #[instrument(skip(self, request), err)]
    pub async fn advance(
        &self,
        session_id: &str,
        request: AdvanceRequest,
    ) -> Result<AdvanceOutcome, ExecutorError> {
        let checkpoint = match self.store.load(session_id).await? {
            None => {
                let state = WorkflowState::builder()
                    .org(request.org_id)
                    .user(request.user_id)
                    .conversation(request.conversation_id)
                    .session(session_id)
                    .user_message(&request.message)
                    .build();
                let checkpoint = Checkpoint::initial(session_id, self.graph.entry(), state);
                self.store
                    .compare_and_swap(None, &checkpoint)
                    .await
                    .map_err(|e| self.map_store_error(session_id, e))?;
                self.emit(session_id, "session created");
                checkpoint
            }
            Some(existing) => match existing.status {
                WorkflowStatus::Suspended => {
                    return Err(ExecutorError::AwaitingApproval {
                        session_id: session_id.to_string(),
                    });
                }
                status if status.is_terminal() => {
                    return Err(ExecutorError::SessionClosed {
                        session_id: session_id.to_string(),
                        status,
                    });
                }
                _ => {
                    let mut resumed = existing;
                    resumed.state.fold_user_message(&request.message);
                    self.emit(session_id, "continuing interrupted session");
                    resumed
                }
            },
        };
        self.run_loop(checkpoint).await
    }

    /// Resume a suspended session with the approval decision.
    ///
    /// The decision is folded into state and the suspending node's
    /// successor is re-resolved against the updated state - the decision,
    /// not the topology, picks whether the gated action runs.
    #[instrument(skip(self), err)]
    pub async fn resume(
        &self,
        session_id: &str,
        approved: bool,
    ) -> Result<AdvanceOutcome, ExecutorError> {
        let Some(mut checkpoint) = self.store.load(session_id).await? else {
            return Err(ExecutorError::NoSuchSession {
                session_id: session_id.to_string(),
            });
        };
        match checkpoint.status {
            WorkflowStatus::Suspended => {}
            _ if checkpoint.state.approval_resolved() => {
                return Err(ExecutorError::AlreadyResolved {
                    session_id: session_id.to_string(),
                });
            }
            _ => {
                return Err(ExecutorError::NoSuchSession {
                    session_id: session_id.to_string(),
                });
            }
        }

        let gate = checkpoint
            .state
            .approval
            .as_mut()
            .ok_or(StoreError::Missing("approval gate"))?;
        gate.approved = Some(approved);
        gate.requires_approval = false;
        self.emit(
            session_id,
            format!("approval decision recorded: approved={approved}"),
        );

        // Re-resolve the suspension point's successor with the decision
        // folded in, then persist before running anything.
        let suspended_at = match &checkpoint.current_node {
            NodeId::Named(name) => name.clone(),
            NodeId::End => {
                return Err(ExecutorError::Routing(RoutingError::Unresolvable {
                    from: "End".to_string(),
                }));
            }
        };
        let expected = checkpoint.version;
        match self.graph.resolve_successor(&suspended_at, &checkpoint.state) {
            Err(routing) => {
                checkpoint
                    .state
                    .errors
                    .push(ErrorEvent::executor(session_id, routing.to_string()));
                self.persist_failed(&mut checkpoint, expected, &routing.to_string())
                    .await?;
                Err(ExecutorError::Routing(routing))
            }
            Ok(NodeId::End) => {
                let done = checkpoint.advanced(
                    WorkflowStatus::Completed,
                    NodeId::Named(suspended_at),
                    checkpoint.state.clone(),
                );
                self.persist(expected, &done).await?;
                self.emit(session_id, "completed at approval gate");
                Ok(Self::outcome(&done))
            }
            Ok(next) => {
                let running =
                    checkpoint.advanced(WorkflowStatus::Running, next, checkpoint.state.clone());
                self.persist(expected, &running).await?;
                self.run_loop(running).await
            }
        }
    }

    /// Execute nodes from the checkpoint's position until termination or
    /// suspension, persisting after every node.
    async fn run_loop(&self, mut checkpoint: Checkpoint) -> Result<AdvanceOutcome, ExecutorError> {
        let session_id = checkpoint.session_id.clone();
        let mut steps_this_call = 0usize;

        loop {
            let node_name = match &checkpoint.current_node {
                NodeId::Named(name) => name.clone(),
                // A checkpoint never points at End while RUNNING; treat a
                // corrupt row as unroutable.
                NodeId::End => {
                    return Err(ExecutorError::Routing(RoutingError::Unresolvable {
                        from: "End".to_string(),
                    }));
                }
            };

            steps_this_call += 1;
            if steps_this_call > MAX_STEPS_PER_ADVANCE {
                let expected = checkpoint.version;
                self.persist_failed(&mut checkpoint, expected, "step budget exceeded")
                    .await?;
                return Err(ExecutorError::StepBudgetExceeded {
                    limit: MAX_STEPS_PER_ADVANCE,
                });
            }

            let Some(node) = self.graph.node(&node_name) else {
                // The checkpoint references a node this graph no longer has.
                let routing = RoutingError::Unresolvable {
                    from: node_name.clone(),
                };
                let expected = checkpoint.version;
                self.persist_failed(&mut checkpoint, expected, &routing.to_string())
                    .await?;
                return Err(ExecutorError::Routing(routing));
            };
            let node = Arc::clone(node);

            let ctx = NodeContext {
                node: node_name.clone(),
                step: checkpoint.state.node_history.len() as u64,
                session_id: session_id.clone(),
                event_sender: self.event_bus.get_emitter(),
            };
            let expected = checkpoint.version;

            let output = match node.run(checkpoint.state.snapshot(), ctx).await {
                Ok(output) => output,
                Err(node_err) => {
                    tracing::error!(node = %node_name, error = %node_err, "node failed");
                    checkpoint
                        .state
                        .errors
                        .push(ErrorEvent::node(&node_name, node_err.to_string()));
                    checkpoint.state.node_history.push(node_name.clone());
                    let failed = checkpoint.advanced(
                        WorkflowStatus::Failed,
                        NodeId::Named(node_name),
                        checkpoint.state.clone(),
                    );
                    self.persist(expected, &failed).await?;
                    self.emit(&session_id, "workflow failed");
                    // Best-effort response: the caller still gets the
                    // accumulated outputs and the error list.
                    return Ok(Self::outcome(&failed));
                }
            };

            if let Err(schema) =
                apply_update(&mut checkpoint.state, &node_name, node.declared_keys(), &output.update)
            {
                checkpoint
                    .state
                    .errors
                    .push(ErrorEvent::executor(&session_id, schema.to_string()));
                self.persist_failed(&mut checkpoint, expected, "node contract violation")
                    .await?;
                return Err(ExecutorError::Schema(schema));
            }
            checkpoint.state.node_history.push(node_name.clone());

            if let Some(NodeHint::Suspend(request)) = output.hint {
                checkpoint.state.approval = Some(ApprovalGate {
                    requires_approval: true,
                    approval_type: request.approval_type,
                    pending_action: request.pending_action,
                    approved: None,
                    prompt: request.prompt,
                });
                let suspended = checkpoint.advanced(
                    WorkflowStatus::Suspended,
                    NodeId::Named(node_name),
                    checkpoint.state.clone(),
                );
                self.persist(expected, &suspended).await?;
                self.emit(&session_id, "suspended awaiting approval");
                return Ok(Self::outcome(&suspended));
            }

            match self.graph.resolve_successor(&node_name, &checkpoint.state) {
                Err(routing) => {
                    checkpoint
                        .state
                        .errors
                        .push(ErrorEvent::executor(&session_id, routing.to_string()));
                    self.persist_failed(&mut checkpoint, expected, &routing.to_string())
                        .await?;
                    return Err(ExecutorError::Routing(routing));
                }
                Ok(NodeId::End) => {
                    let done = checkpoint.advanced(
                        WorkflowStatus::Completed,
                        NodeId::Named(node_name),
                        checkpoint.state.clone(),
                    );
                    self.persist(expected, &done).await?;
                    self.emit(&session_id, "completed");
                    return Ok(Self::outcome(&done));
                }
                Ok(next) => {
                    let running = checkpoint.advanced(
                        WorkflowStatus::Running,
                        next,
                        checkpoint.state.clone(),
                    );
                    self.persist(expected, &running).await?;
                    checkpoint = running;
                }
            }
        }
    }

    /// CAS write mapping a version conflict into
    /// [`ExecutorError::ConcurrentModification`].
    async fn persist(&self, expected: u64, next: &Checkpoint) -> Result<(), ExecutorError> {
        self.store
            .compare_and_swap(Some(expected), next)
            .await
            .map_err(|e| self.map_store_error(&next.session_id, e))
    }

    /// Persist a `FAILED` checkpoint at the current position.
    async fn persist_failed(
        &self,
        checkpoint: &mut Checkpoint,
        expected: u64,
        reason: &str,
    ) -> Result<(), ExecutorError> {
        let failed = checkpoint.advanced(
            WorkflowStatus::Failed,
            checkpoint.current_node.clone(),
            checkpoint.state.clone(),
        );
        self.persist(expected, &failed).await?;
        self.emit(&checkpoint.session_id, format!("workflow failed: {reason}"));
        *checkpoint = failed;
        Ok(())
    }

    fn map_store_error(&self, session_id: &str, error: StoreError) -> ExecutorError {
        match error {
            StoreError::Conflict { .. } => ExecutorError::ConcurrentModification {
                session_id: session_id.to_string(),
            },
            other => ExecutorError::Store(other),
        }
    }

    fn emit(&self, session_id: &str, message: impl Into<String>) {
        // Events are observability, not control flow: a disconnected bus
        // is not an executor failure.
        let _ = self
            .event_bus
            .get_emitter()
            .send(Event::executor(session_id, message));
    }

    fn outcome(checkpoint: &Checkpoint) -> AdvanceOutcome {
        let approval_prompt = checkpoint
            .state
            .approval
            .as_ref()
            .filter(|gate| gate.requires_approval)
            .map(|gate| gate.prompt.clone());
        AdvanceOutcome {
            response_text: checkpoint.state.response_text.clone().unwrap_or_default(),
            response_data: checkpoint.state.response_data.clone(),
            requires_approval: checkpoint.state.requires_approval(),
            approval_prompt,
            status: checkpoint.status,
            errors: checkpoint.state.errors.clone(),
        }
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("graph", &self.graph)
            .finish()
    }
}
