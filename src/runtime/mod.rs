//! Workflow runtime: the executor, checkpoint model, and persistence
//! backends.
//!
//! # Architecture
//!
//! - **[`Executor`]** - drives one workflow instance per `advance`/`resume`
//!   call, enforcing the approval-suspension protocol
//! - **[`CheckpointStore`]** - pluggable persistence behind atomic
//!   compare-and-swap
//! - **[`InMemoryStore`]** - volatile backend for development and tests
//! - **`SqliteStore`** - durable sqlx backend (feature `sqlite`)
//! - **Persistence models** - serde-friendly checkpoint shapes
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use dispatchflow::graph::WorkflowGraph;
//! use dispatchflow::runtime::{AdvanceRequest, Executor, InMemoryStore};
//! use std::sync::Arc;
//!
//! # async fn example(graph: Arc<WorkflowGraph>) -> Result<(), Box<dyn std::error::Error>> {
//! let executor = Executor::new(graph, Arc::new(InMemoryStore::new()));
//! let outcome = executor
//!     .advance("sess-1", AdvanceRequest::new("org", "user", "conv", "hello"))
//!     .await?;
//! println!("{}: {}", outcome.status, outcome.response_text);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod executor;
pub mod persistence;
pub mod store;
#[cfg(feature = "sqlite")]
pub mod store_sqlite;

pub use config::{RuntimeConfig, StoreType};
pub use executor::{
    AdvanceOutcome, AdvanceRequest, Executor, ExecutorError, MAX_STEPS_PER_ADVANCE,
};
pub use persistence::PersistedCheckpoint;
pub use store::{Checkpoint, CheckpointStore, InMemoryStore, StoreError};
#[cfg(feature = "sqlite")]
pub use store_sqlite::SqliteStore;
