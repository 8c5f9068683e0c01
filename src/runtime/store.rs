//! Checkpoint model and the store contract.
//!
//! A [`Checkpoint`] is the persisted position of one workflow instance:
//! state snapshot, current node, status, and a monotonically increasing
//! `version`. Every write goes through
//! [`compare_and_swap`](CheckpointStore::compare_and_swap) with the
//! version the writer last loaded - concurrent executions of the same
//! session race on the swap and exactly one wins. No other locking is
//! required or permitted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::sync::Mutex;
use thiserror::Error;

use crate::state::WorkflowState;
use crate::types::{NodeId, WorkflowStatus};

/// Persisted tuple for one workflow instance.
///
/// `version` increments on every persisted write and is the optimistic
/// concurrency token. `current_node` is the resume position: the node to
/// execute next while `RUNNING`, or the suspension point while
/// `SUSPENDED`.
#[derive(Clone, Debug, PartialEq)]
pub struct Checkpoint {
    pub session_id: String,
    pub version: u64,
    pub status: WorkflowStatus,
    pub current_node: NodeId,
    pub state: WorkflowState,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// First checkpoint of a fresh session, positioned at the entry node.
    #[must_use]
    pub fn initial(session_id: impl Into<String>, entry: &str, state: WorkflowState) -> Self {
        Self {
            session_id: session_id.into(),
            version: 1,
            status: WorkflowStatus::Running,
            current_node: NodeId::named(entry),
            state,
            updated_at: Utc::now(),
        }
    }

    /// Next version of this checkpoint with updated position and status.
    #[must_use]
    pub fn advanced(&self, status: WorkflowStatus, current_node: NodeId, state: WorkflowState) -> Self {
        Self {
            session_id: self.session_id.clone(),
            version: self.version + 1,
            status,
            current_node,
            state,
            updated_at: Utc::now(),
        }
    }
}

/// Store-level failures.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    /// The compare-and-swap lost: another execution advanced this session
    /// concurrently. The caller retries against the now-current
    /// checkpoint.
    #[error("checkpoint version conflict for session '{session_id}' (expected {expected:?})")]
    #[diagnostic(
        code(dispatchflow::store::conflict),
        help("Reload the checkpoint and retry against its current version.")
    )]
    Conflict {
        session_id: String,
        expected: Option<u64>,
    },

    /// Backend I/O failure (connection, SQL, migration).
    #[error("checkpoint store backend error: {message}")]
    #[diagnostic(code(dispatchflow::store::backend))]
    Backend { message: String },

    /// Serialization failure while encoding or decoding a checkpoint row.
    #[error("checkpoint serialization error: {source}")]
    #[diagnostic(code(dispatchflow::store::serde))]
    Serde {
        #[source]
        source: serde_json::Error,
    },

    /// A persisted row is missing a required field.
    #[error("missing persisted field: {0}")]
    #[diagnostic(code(dispatchflow::store::missing))]
    Missing(&'static str),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Durable keyed storage for workflow checkpoints.
///
/// Implementations must honor atomic compare-and-swap semantics: for a
/// given session, of N concurrent `compare_and_swap` calls against the
/// same expected version, exactly one succeeds.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the checkpoint for a session, if one exists.
    async fn load(&self, session_id: &str) -> Result<Option<Checkpoint>>;

    /// Atomically persist `checkpoint` if the stored version still equals
    /// `expected_version`.
    ///
    /// `None` means "create": the write fails with
    /// [`StoreError::Conflict`] if any checkpoint already exists for the
    /// session. `Some(v)` means "advance": the write fails if the stored
    /// version is not exactly `v`.
    async fn compare_and_swap(
        &self,
        expected_version: Option<u64>,
        checkpoint: &Checkpoint,
    ) -> Result<()>;

    /// Session ids currently known to the store (diagnostics).
    async fn list_sessions(&self) -> Result<Vec<String>>;
}

/// Process-local store for development and testing.
///
/// The CAS runs under a single mutex, which trivially satisfies the
/// atomicity contract for one process.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    sessions: Mutex<FxHashMap<String, Checkpoint>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryStore {
    async fn load(&self, session_id: &str) -> Result<Option<Checkpoint>> {
        Ok(self
            .sessions
            .lock()
            .expect("store poisoned")
            .get(session_id)
            .cloned())
    }

    async fn compare_and_swap(
        &self,
        expected_version: Option<u64>,
        checkpoint: &Checkpoint,
    ) -> Result<()> {
        let mut sessions = self.sessions.lock().expect("store poisoned");
        let stored = sessions.get(&checkpoint.session_id).map(|cp| cp.version);
        if stored != expected_version {
            return Err(StoreError::Conflict {
                session_id: checkpoint.session_id.clone(),
                expected: expected_version,
            });
        }
        sessions.insert(checkpoint.session_id.clone(), checkpoint.clone());
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<String>> {
        Ok(self
            .sessions
            .lock()
            .expect("store poisoned")
            .keys()
            .cloned()
            .collect())
    }
}
