//! # Dispatchflow: Durable Conversational Workflow Engine
//!
//! Dispatchflow replaces branching conditional logic in conversational
//! dispatch applications with a durable, resumable workflow engine: a
//! directed graph of nodes routes each user request through intent
//! classification, domain handling, and an optional human-approval gate
//! before any irreversible side effect runs.
//!
//! ## Core Concepts
//!
//! - **State**: one [`WorkflowState`](state::WorkflowState) record per
//!   session - the single source of truth, checkpointed after every node
//! - **Nodes**: async units of work returning partial state updates
//! - **Graph**: declarative edges (fixed, terminal, or router functions),
//!   validated at compile time and immutable afterwards
//! - **Executor**: drives an instance until termination or suspension,
//!   writing every checkpoint through compare-and-swap
//! - **Approval gate**: suspension as explicit persisted state - a
//!   suspended workflow holds no thread, and its gated action runs at
//!   most once, only after an explicit `resume(session, true)`
//!
//! ## Building a Dispatch Workflow
//!
//! ```rust
//! use dispatchflow::graph::{approval_router, GraphBuilder, IntentRoutes};
//! use dispatchflow::intent::{ClassifierNode, HeuristicClassifier};
//! use dispatchflow::respond::{ResponseGeneratorNode, RESPONSE_GENERATOR};
//! use std::sync::Arc;
//!
//! let graph = GraphBuilder::new()
//!     .add_node("classify", ClassifierNode::new(Arc::new(HeuristicClassifier::default())))
//!     .add_node(RESPONSE_GENERATOR, ResponseGeneratorNode)
//!     .set_entry("classify")
//!     .add_router(
//!         "classify",
//!         IntentRoutes::new(RESPONSE_GENERATOR).into_router(),
//!     )
//!     .add_edge(RESPONSE_GENERATOR, "End")
//!     .compile()
//!     .expect("valid graph");
//!
//! assert_eq!(graph.entry(), "classify");
//! ```
//!
//! ## Running Sessions
//!
//! ```rust,no_run
//! use dispatchflow::graph::WorkflowGraph;
//! use dispatchflow::runtime::{AdvanceRequest, Executor, InMemoryStore};
//! use std::sync::Arc;
//!
//! # async fn example(graph: Arc<WorkflowGraph>) -> Result<(), Box<dyn std::error::Error>> {
//! let executor = Executor::new(graph, Arc::new(InMemoryStore::new()));
//!
//! let outcome = executor
//!     .advance(
//!         "sess-1",
//!         AdvanceRequest::new("org-1", "dispatcher-7", "conv-42",
//!                             "notify all drivers about the shift change"),
//!     )
//!     .await?;
//!
//! if outcome.requires_approval {
//!     // Minutes or days later, from any process sharing the store:
//!     let resolved = executor.resume("sess-1", true).await?;
//!     println!("{}", resolved.response_text);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Domain-level problems (no matching drivers, a degraded classifier)
//! never abort the graph: they are appended to the state's
//! [`errors`](state::WorkflowState::errors) and surfaced in the outcome.
//! Infrastructure problems abort the current call with a typed
//! [`ExecutorError`](runtime::ExecutorError) and leave the checkpoint in
//! its last-good state, so a retry is safe.
//!
//! ## Module Guide
//!
//! - [`state`] - The workflow state record and builder
//! - [`node`] - Node trait, partial updates, suspension hints
//! - [`graph`] - Graph definition, routers, compilation
//! - [`intent`] - Intent classification and the router node
//! - [`gateway`] - Notification gateway and the gated-action node
//! - [`tools`] - Domain-tool collaborator contract
//! - [`respond`] - Default terminal response node
//! - [`runtime`] - Executor, checkpoint store, persistence backends
//! - [`event_bus`] - Observability events and sinks
//! - [`telemetry`] - Tracing setup and error rendering

pub mod errors;
pub mod event_bus;
pub mod gateway;
pub mod graph;
pub mod intent;
pub mod message;
pub mod node;
pub mod reducers;
pub mod respond;
pub mod runtime;
pub mod state;
pub mod telemetry;
pub mod tools;
pub mod types;
pub mod utils;
