//! The compiled, immutable workflow graph.

use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHasher};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use thiserror::Error;

use super::edges::Successor;
use crate::node::Node;
use crate::state::WorkflowState;
use crate::types::NodeId;

/// Routing failures surfaced while resolving a successor at runtime.
///
/// These are fatal: the executor transitions the workflow to `FAILED`
/// rather than looping on a malformed route.
#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum RoutingError {
    #[error("router at '{from}' returned unknown target '{target}'")]
    #[diagnostic(
        code(dispatchflow::graph::unknown_router_target),
        help("Routers must return the name of a registered node or \"End\".")
    )]
    UnknownTarget { from: String, target: String },

    #[error("no successor resolvable for node '{from}'")]
    #[diagnostic(code(dispatchflow::graph::unresolvable))]
    Unresolvable { from: String },
}

/// Read-only diagnostics view of a compiled graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphInfo {
    /// Entry node name.
    pub entry: String,
    /// Sorted names of all registered nodes.
    pub nodes: Vec<String>,
    /// Stable fingerprint of the topology; changes iff the node set,
    /// entry, or edge shape changes.
    pub version: u64,
}

/// A validated workflow graph, immutable after construction.
///
/// Built once at process start and shared read-only (`Arc`) across all
/// concurrent workflow instances. Multiple independent graphs can coexist
/// in one process - there is deliberately no global registry.
pub struct WorkflowGraph {
    nodes: FxHashMap<String, Arc<dyn Node>>,
    successors: FxHashMap<String, Successor>,
    entry: String,
    version: u64,
}

impl WorkflowGraph {
    pub(crate) fn from_parts(
        nodes: FxHashMap<String, Arc<dyn Node>>,
        successors: FxHashMap<String, Successor>,
        entry: String,
    ) -> Self {
        let version = fingerprint(&nodes, &successors, &entry);
        Self {
            nodes,
            successors,
            entry,
            version,
        }
    }

    /// Entry node name for new workflow instances.
    #[must_use]
    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Look up a registered node.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&Arc<dyn Node>> {
        self.nodes.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Resolve the successor of `from` against the current state.
    ///
    /// Fixed edges resolve structurally; router edges evaluate their
    /// function and validate the returned name. `Ok(NodeId::End)` means
    /// the workflow completes.
    pub fn resolve_successor(
        &self,
        from: &str,
        state: &WorkflowState,
    ) -> Result<NodeId, RoutingError> {
        match self.successors.get(from) {
            None => Err(RoutingError::Unresolvable {
                from: from.to_string(),
            }),
            Some(Successor::End) => Ok(NodeId::End),
            Some(Successor::Node(id)) => Ok(id.clone()),
            Some(Successor::Router(router)) => {
                let target = router(state);
                if target == "End" {
                    Ok(NodeId::End)
                } else if self.nodes.contains_key(&target) {
                    Ok(NodeId::Named(target))
                } else {
                    Err(RoutingError::UnknownTarget {
                        from: from.to_string(),
                        target,
                    })
                }
            }
        }
    }

    /// Diagnostics view: node set, entry, and topology fingerprint.
    #[must_use]
    pub fn info(&self) -> GraphInfo {
        let mut nodes: Vec<String> = self.nodes.keys().cloned().collect();
        nodes.sort();
        GraphInfo {
            entry: self.entry.clone(),
            nodes,
            version: self.version,
        }
    }
}

impl std::fmt::Debug for WorkflowGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowGraph")
            .field("entry", &self.entry)
            .field("nodes", &self.nodes.len())
            .field("version", &self.version)
            .finish()
    }
}

/// Stable topology fingerprint: sorted node names, entry, and the shape
/// of every edge. Router closures hash by their origin only - two graphs
/// differing solely in router internals share a fingerprint.
fn fingerprint(
    nodes: &FxHashMap<String, Arc<dyn Node>>,
    successors: &FxHashMap<String, Successor>,
    entry: &str,
) -> u64 {
    let mut hasher = FxHasher::default();
    entry.hash(&mut hasher);
    let mut names: Vec<&String> = nodes.keys().collect();
    names.sort();
    for name in names {
        name.hash(&mut hasher);
        match successors.get(name) {
            Some(Successor::End) => "->End".hash(&mut hasher),
            Some(Successor::Node(id)) => format!("->{}", id.encode()).hash(&mut hasher),
            Some(Successor::Router(_)) => "->Router".hash(&mut hasher),
            None => "->?".hash(&mut hasher),
        }
    }
    hasher.finish()
}
