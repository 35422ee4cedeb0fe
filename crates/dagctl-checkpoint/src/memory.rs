//! In-memory checkpoint store, the default backend for tests and single
//! process deployments. This implementation never fails a `put` due to
//! capacity, only on a poisoned lock, which can't happen with
//! `parking_lot`.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{Checkpoint, CheckpointStore, Result};

#[derive(Default, Clone)]
pub struct InMemoryCheckpointStore {
    by_workflow: Arc<RwLock<HashMap<String, Vec<Checkpoint>>>>,
    by_id: Arc<RwLock<HashMap<String, Checkpoint>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn put(&self, checkpoint: Checkpoint, retention: usize) -> Result<()> {
        let workflow_id = checkpoint.workflow_id.clone();
        self.by_id.write().insert(checkpoint.id.clone(), checkpoint.clone());

        let mut by_workflow = self.by_workflow.write();
        let entries = by_workflow.entry(workflow_id).or_default();
        entries.push(checkpoint);
        entries.sort_by_key(|c| c.layer);

        while entries.len() > retention {
            let pruned = entries.remove(0);
            self.by_id.write().remove(&pruned.id);
        }
        Ok(())
    }

    async fn get(&self, checkpoint_id: &str) -> Result<Option<Checkpoint>> {
        Ok(self.by_id.read().get(checkpoint_id).cloned())
    }

    async fn latest(&self, workflow_id: &str) -> Result<Option<Checkpoint>> {
        Ok(self
            .by_workflow
            .read()
            .get(workflow_id)
            .and_then(|entries| entries.iter().max_by_key(|c| c.layer).cloned()))
    }

    async fn list(&self, workflow_id: &str) -> Result<Vec<Checkpoint>> {
        Ok(self.by_workflow.read().get(workflow_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn retention_prunes_oldest_first() {
        let store = InMemoryCheckpointStore::new();
        for layer in 0..7 {
            store
                .put(Checkpoint::new("wf-1", layer, json!({"layer": layer}), layer as i64), 5)
                .await
                .unwrap();
        }
        let remaining = store.list("wf-1").await.unwrap();
        assert_eq!(remaining.len(), 5);
        let layers: Vec<usize> = remaining.iter().map(|c| c.layer).collect();
        assert_eq!(layers, vec![2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn latest_returns_highest_layer() {
        let store = InMemoryCheckpointStore::new();
        store.put(Checkpoint::new("wf-1", 0, json!({}), 0), 5).await.unwrap();
        store.put(Checkpoint::new("wf-1", 1, json!({}), 1), 5).await.unwrap();
        let latest = store.latest("wf-1").await.unwrap().unwrap();
        assert_eq!(latest.layer, 1);
    }
}
