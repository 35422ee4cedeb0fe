//! Checkpoint trait abstraction and storage backends.
//!
//! A [`Checkpoint`] is an opaque, durable snapshot of a workflow's state
//! keyed by `(workflow_id, layer)`. This crate defines the
//! [`CheckpointStore`] trait dagctl-core persists through and ships an
//! in-memory implementation; `dagctl-server` adds a `sqlx`-backed one
//! behind the `sqlite` feature. Adapted from `langgraph-checkpoint`'s
//! `CheckpointSaver` trait and `InMemorySaver`, generalized from
//! per-channel graph state to an opaque JSON `WorkflowState` document.

mod error;
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use error::CheckpointError;
pub use memory::InMemoryCheckpointStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCheckpointStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, CheckpointError>;

/// A durable snapshot. `state` is kept as an opaque JSON document so
/// this crate never needs to depend on `dagctl-core`'s `WorkflowState`
/// type directly, avoiding a dependency cycle and keeping the
/// checkpoint format forward-compatible with state-shape changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub workflow_id: String,
    pub timestamp: i64,
    pub layer: usize,
    pub state: serde_json::Value,
}

impl Checkpoint {
    pub fn new(workflow_id: impl Into<String>, layer: usize, state: serde_json::Value, timestamp: i64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workflow_id: workflow_id.into(),
            timestamp,
            layer,
            state,
        }
    }
}

/// Storage backend for checkpoints. Implementations own retention:
/// `put` must prune so that at most `retention` checkpoints remain for
/// `checkpoint.workflow_id`, oldest first.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn put(&self, checkpoint: Checkpoint, retention: usize) -> Result<()>;

    async fn get(&self, checkpoint_id: &str) -> Result<Option<Checkpoint>>;

    /// Latest checkpoint for a workflow, if any.
    async fn latest(&self, workflow_id: &str) -> Result<Option<Checkpoint>>;

    async fn list(&self, workflow_id: &str) -> Result<Vec<Checkpoint>>;
}
