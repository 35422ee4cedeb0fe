//! `sqlx`-backed [`CheckpointStore`], the durable backend `dagctl-server`
//! wires in for production deployments. Adapted from `orchestrator`'s
//! `CheckpointRepository`, narrowed from its richer
//! execution/node/superstep-keyed schema to the `(workflow_id, layer)`
//! shape this crate's [`Checkpoint`] uses.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

use crate::{Checkpoint, CheckpointError, CheckpointStore, Result};

pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    /// Runs the crate's bundled migrations against `pool` before
    /// returning, so callers never need to manage the schema directly.
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| CheckpointError::Backend(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn put(&self, checkpoint: Checkpoint, retention: usize) -> Result<()> {
        let state_json = serde_json::to_string(&checkpoint.state)?;
        sqlx::query(
            "INSERT INTO checkpoints (id, workflow_id, layer, timestamp, state) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&checkpoint.id)
        .bind(&checkpoint.workflow_id)
        .bind(checkpoint.layer as i64)
        .bind(checkpoint.timestamp)
        .bind(&state_json)
        .execute(&self.pool)
        .await
        .map_err(|e| CheckpointError::Backend(e.to_string()))?;

        let stale: Vec<String> = sqlx::query(
            "SELECT id FROM checkpoints WHERE workflow_id = ? ORDER BY layer DESC, timestamp DESC LIMIT -1 OFFSET ?",
        )
        .bind(&checkpoint.workflow_id)
        .bind(retention as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CheckpointError::Backend(e.to_string()))?
        .into_iter()
        .map(|row| row.get::<String, _>("id"))
        .collect();

        for id in stale {
            sqlx::query("DELETE FROM checkpoints WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| CheckpointError::Backend(e.to_string()))?;
        }
        Ok(())
    }

    async fn get(&self, checkpoint_id: &str) -> Result<Option<Checkpoint>> {
        let row = sqlx::query("SELECT id, workflow_id, layer, timestamp, state FROM checkpoints WHERE id = ?")
            .bind(checkpoint_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CheckpointError::Backend(e.to_string()))?;
        row.map(row_to_checkpoint).transpose()
    }

    async fn latest(&self, workflow_id: &str) -> Result<Option<Checkpoint>> {
        let row = sqlx::query(
            "SELECT id, workflow_id, layer, timestamp, state FROM checkpoints WHERE workflow_id = ? ORDER BY layer DESC, timestamp DESC LIMIT 1",
        )
        .bind(workflow_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CheckpointError::Backend(e.to_string()))?;
        row.map(row_to_checkpoint).transpose()
    }

    async fn list(&self, workflow_id: &str) -> Result<Vec<Checkpoint>> {
        let rows = sqlx::query(
            "SELECT id, workflow_id, layer, timestamp, state FROM checkpoints WHERE workflow_id = ? ORDER BY layer ASC",
        )
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CheckpointError::Backend(e.to_string()))?;
        rows.into_iter().map(row_to_checkpoint).collect()
    }
}

fn row_to_checkpoint(row: sqlx::sqlite::SqliteRow) -> Result<Checkpoint> {
    let state_json: String = row.get("state");
    Ok(Checkpoint {
        id: row.get("id"),
        workflow_id: row.get("workflow_id"),
        layer: row.get::<i64, _>("layer") as usize,
        timestamp: row.get("timestamp"),
        state: serde_json::from_str(&state_json)?,
    })
}
