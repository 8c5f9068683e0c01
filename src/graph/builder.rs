//! Builder for workflow graphs.
//!
//! [`GraphBuilder`] collects nodes, edges, and the entry point with a
//! fluent API, then [`compile`](GraphBuilder::compile)s into an immutable
//! [`WorkflowGraph`]. Compilation is where static validation happens:
//! a malformed topology is rejected up front instead of surfacing as a
//! runtime routing failure mid-conversation.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;

use super::compiled::WorkflowGraph;
use super::edges::{RouterFn, Successor};
use crate::node::Node;
use crate::types::NodeId;

/// Structural problems detected at compile time.
#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum GraphError {
    #[error("no entry node set")]
    #[diagnostic(
        code(dispatchflow::graph::missing_entry),
        help("Call set_entry() with the name of a registered node.")
    )]
    MissingEntry,

    #[error("entry node '{name}' is not registered")]
    #[diagnostic(code(dispatchflow::graph::unknown_entry))]
    UnknownEntry { name: String },

    #[error("node '{name}' registered more than once")]
    #[diagnostic(code(dispatchflow::graph::duplicate_node))]
    DuplicateNode { name: String },

    #[error("edge from '{from}' targets unregistered node '{to}'")]
    #[diagnostic(code(dispatchflow::graph::unknown_edge_target))]
    UnknownEdgeTarget { from: String, to: String },

    #[error("node '{name}' has no successor")]
    #[diagnostic(
        code(dispatchflow::graph::missing_successor),
        help("Every node needs an edge, a router, or an explicit edge to End.")
    )]
    MissingSuccessor { name: String },

    #[error("successor declared for unregistered node '{name}'")]
    #[diagnostic(code(dispatchflow::graph::dangling_successor))]
    DanglingSuccessor { name: String },
}

/// Fluent builder producing an immutable [`WorkflowGraph`].
///
/// # Examples
///
/// ```rust
/// use dispatchflow::graph::{GraphBuilder, IntentRoutes};
/// use dispatchflow::node::{Node, NodeContext, NodeError, NodeOutput, StateUpdate};
/// use dispatchflow::state::WorkflowState;
/// use async_trait::async_trait;
///
/// struct Echo;
///
/// #[async_trait]
/// impl Node for Echo {
///     async fn run(&self, _: WorkflowState, _: NodeContext) -> Result<NodeOutput, NodeError> {
///         Ok(NodeOutput::advance(StateUpdate::new()))
///     }
/// }
///
/// let graph = GraphBuilder::new()
///     .add_node("classify", Echo)
///     .add_node("respond", Echo)
///     .set_entry("classify")
///     .add_router("classify", IntentRoutes::new("respond").into_router())
///     .add_edge("respond", "End")
///     .compile()
///     .unwrap();
///
/// assert_eq!(graph.info().entry, "classify");
/// ```
pub struct GraphBuilder {
    nodes: FxHashMap<String, Arc<dyn Node>>,
    successors: FxHashMap<String, Successor>,
    entry: Option<String>,
    duplicates: Vec<String>,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: FxHashMap::default(),
            successors: FxHashMap::default(),
            entry: None,
            duplicates: Vec::new(),
        }
    }

    /// Register a node under a unique name.
    #[must_use]
    pub fn add_node(mut self, name: impl Into<String>, node: impl Node + 'static) -> Self {
        let name = name.into();
        if self.nodes.insert(name.clone(), Arc::new(node)).is_some() {
            self.duplicates.push(name);
        }
        self
    }

    /// Register an already-shared node.
    #[must_use]
    pub fn add_shared_node(mut self, name: impl Into<String>, node: Arc<dyn Node>) -> Self {
        let name = name.into();
        if self.nodes.insert(name.clone(), node).is_some() {
            self.duplicates.push(name);
        }
        self
    }

    /// Designate the entry node for new workflow instances.
    #[must_use]
    pub fn set_entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    /// Add an unconditional edge. `"End"` (or [`NodeId::End`]) makes
    /// `from` terminal.
    #[must_use]
    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<NodeId>) -> Self {
        let successor = match to.into() {
            NodeId::End => Successor::End,
            id => Successor::Node(id),
        };
        self.successors.insert(from.into(), successor);
        self
    }

    /// Add a conditional edge computed by `router`.
    #[must_use]
    pub fn add_router(mut self, from: impl Into<String>, router: RouterFn) -> Self {
        self.successors.insert(from.into(), Successor::Router(router));
        self
    }

    /// Validate and produce the immutable graph.
    ///
    /// # Errors
    ///
    /// Returns the first structural problem found: missing/unknown entry,
    /// duplicate registrations, fixed edges to unregistered nodes, nodes
    /// without a successor, or successors for unregistered nodes.
    pub fn compile(self) -> Result<WorkflowGraph, GraphError> {
        if let Some(name) = self.duplicates.first() {
            return Err(GraphError::DuplicateNode { name: name.clone() });
        }
        let entry = self.entry.ok_or(GraphError::MissingEntry)?;
        if !self.nodes.contains_key(&entry) {
            return Err(GraphError::UnknownEntry { name: entry });
        }
        for (from, successor) in &self.successors {
            if !self.nodes.contains_key(from) {
                return Err(GraphError::DanglingSuccessor { name: from.clone() });
            }
            if let Successor::Node(NodeId::Named(to)) = successor {
                if !self.nodes.contains_key(to) {
                    return Err(GraphError::UnknownEdgeTarget {
                        from: from.clone(),
                        to: to.clone(),
                    });
                }
            }
        }
        for name in self.nodes.keys() {
            if !self.successors.contains_key(name) {
                return Err(GraphError::MissingSuccessor { name: name.clone() });
            }
        }
        Ok(WorkflowGraph::from_parts(self.nodes, self.successors, entry))
    }
}
