//! Workflow graph definition and compilation.
//!
//! A graph is nodes plus edges-as-data: every node has exactly one
//! [`Successor`] - a fixed target, the terminal marker, or a router
//! function over current state. [`GraphBuilder`] validates the topology
//! at compile time; the resulting [`WorkflowGraph`] is immutable and
//! shared read-only across all concurrent workflow instances.
//!
//! # Quick Start
//!
//! ```rust
//! use dispatchflow::graph::{GraphBuilder, IntentRoutes};
//! use dispatchflow::node::{Node, NodeContext, NodeError, NodeOutput, StateUpdate};
//! use dispatchflow::state::WorkflowState;
//! use async_trait::async_trait;
//!
//! struct Passthrough;
//!
//! #[async_trait]
//! impl Node for Passthrough {
//!     async fn run(&self, _: WorkflowState, _: NodeContext) -> Result<NodeOutput, NodeError> {
//!         Ok(NodeOutput::advance(StateUpdate::new()))
//!     }
//! }
//!
//! let graph = GraphBuilder::new()
//!     .add_node("classify", Passthrough)
//!     .add_node("planning", Passthrough)
//!     .add_node("response_generator", Passthrough)
//!     .set_entry("classify")
//!     .add_router(
//!         "classify",
//!         IntentRoutes::new("response_generator")
//!             .route("selection", "planning")
//!             .into_router(),
//!     )
//!     .add_edge("planning", "response_generator")
//!     .add_edge("response_generator", "End")
//!     .compile()
//!     .unwrap();
//!
//! assert_eq!(graph.info().nodes.len(), 3);
//! ```

mod builder;
mod compiled;
mod edges;

pub use builder::{GraphBuilder, GraphError};
pub use compiled::{GraphInfo, RoutingError, WorkflowGraph};
pub use edges::{approval_router, IntentRoutes, RouterFn, Successor};
