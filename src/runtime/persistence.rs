/*!
Persistence primitives for serializing/deserializing checkpoints (used by
the SQLite store and any future durable backends).

Design goals:
- Explicit serde-friendly structs decoupled from the in-memory
  representations: status and node id persist as their stable string
  encodings, timestamps as RFC3339 strings.
- Conversion logic localized in From / TryFrom impls so backend code
  stays lean and declarative.

This module performs no I/O; it is pure data transformation.
*/

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::runtime::store::{Checkpoint, StoreError};
use crate::state::WorkflowState;
use crate::types::{NodeId, WorkflowStatus};

/// Full persisted checkpoint shape.
///
/// `WorkflowState` is already a plain serde record, so it nests directly;
/// the enum-ish fields use their string encodings for forward
/// compatibility with rows written by older builds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedCheckpoint {
    pub session_id: String,
    pub version: u64,
    /// `WorkflowStatus::as_str()` form.
    pub status: String,
    /// `NodeId::encode()` form.
    pub current_node: String,
    pub state: WorkflowState,
    /// RFC3339 string form of the last write time.
    pub updated_at: String,
}

impl From<&Checkpoint> for PersistedCheckpoint {
    fn from(cp: &Checkpoint) -> Self {
        PersistedCheckpoint {
            session_id: cp.session_id.clone(),
            version: cp.version,
            status: cp.status.as_str().to_string(),
            current_node: cp.current_node.encode(),
            state: cp.state.clone(),
            updated_at: cp.updated_at.to_rfc3339(),
        }
    }
}

impl TryFrom<PersistedCheckpoint> for Checkpoint {
    type Error = StoreError;

    fn try_from(p: PersistedCheckpoint) -> Result<Self, StoreError> {
        let status = WorkflowStatus::parse(&p.status).ok_or(StoreError::Missing("status"))?;
        let updated_at = chrono::DateTime::parse_from_rfc3339(&p.updated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        Ok(Checkpoint {
            session_id: p.session_id,
            version: p.version,
            status,
            current_node: NodeId::decode(&p.current_node),
            state: p.state,
            updated_at,
        })
    }
}

/// Serialize a checkpoint's state for a durable row.
pub fn state_to_json(state: &WorkflowState) -> Result<String, StoreError> {
    serde_json::to_string(state).map_err(|e| StoreError::Serde { source: e })
}

/// Deserialize a durable row's state column.
pub fn state_from_json(s: &str) -> Result<WorkflowState, StoreError> {
    serde_json::from_str(s).map_err(|e| StoreError::Serde { source: e })
}
