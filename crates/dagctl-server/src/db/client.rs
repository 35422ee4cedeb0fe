//! [`DbClient`] trait plus its `sqlx` sqlite implementation, the
//! boundary that keeps `dagctl-core`/`dagctl-graphrag` free of a direct
//! `sqlx` dependency, mirroring `orchestrator`'s repository-per-table pattern
//! (`db::repositories::checkpoint_repo` et al.) collapsed into one
//! trait since this schema is small enough not to need per-table
//! modules.

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::db::models::{EntropySample, ExecutionTraceRecord, GraphEdgeRecord, WorkflowExecutionRecord};
use crate::error::{Result, ServerError};

#[async_trait]
pub trait DbClient: Send + Sync {
    async fn record_workflow_execution(&self, record: &WorkflowExecutionRecord) -> Result<()>;
    async fn list_workflow_executions(&self, limit: i64) -> Result<Vec<WorkflowExecutionRecord>>;
    async fn get_workflow_execution(&self, id: &str) -> Result<Option<WorkflowExecutionRecord>>;

    async fn upsert_graph_edge(&self, edge: &GraphEdgeRecord) -> Result<()>;
    async fn list_graph_edges(&self) -> Result<Vec<GraphEdgeRecord>>;

    async fn record_execution_trace(&self, trace: &ExecutionTraceRecord) -> Result<()>;
    async fn list_execution_traces_for_tool(&self, tool_id: &str) -> Result<Vec<ExecutionTraceRecord>>;

    async fn record_entropy_sample(&self, sample: &EntropySample) -> Result<()>;
    async fn recent_entropy_history(&self, limit: i64) -> Result<Vec<EntropySample>>;
}

pub struct SqliteDbClient {
    pool: SqlitePool,
}

impl SqliteDbClient {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new().max_connections(5).connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| ServerError::Config(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DbClient for SqliteDbClient {
    async fn record_workflow_execution(&self, record: &WorkflowExecutionRecord) -> Result<()> {
        let dag_json = serde_json::to_string(&record.dag_json)?;
        sqlx::query(
            "INSERT INTO workflow_execution (id, intent_text, dag_json, success, execution_time_ms, error_message, user_id, executed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.intent_text)
        .bind(dag_json)
        .bind(record.success)
        .bind(record.execution_time_ms)
        .bind(&record.error_message)
        .bind(&record.user_id)
        .bind(record.executed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_workflow_executions(&self, limit: i64) -> Result<Vec<WorkflowExecutionRecord>> {
        let rows = sqlx::query(
            "SELECT id, intent_text, dag_json, success, execution_time_ms, error_message, user_id, executed_at
             FROM workflow_execution ORDER BY executed_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(workflow_execution_from_row).collect()
    }

    async fn get_workflow_execution(&self, id: &str) -> Result<Option<WorkflowExecutionRecord>> {
        let row = sqlx::query(
            "SELECT id, intent_text, dag_json, success, execution_time_ms, error_message, user_id, executed_at
             FROM workflow_execution WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(workflow_execution_from_row).transpose()
    }

    async fn upsert_graph_edge(&self, edge: &GraphEdgeRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO graph_edges (source_tool, target_tool, edge_type, edge_source, weight, count, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(source_tool, target_tool, edge_type)
             DO UPDATE SET edge_source = excluded.edge_source, weight = excluded.weight, count = excluded.count, updated_at = excluded.updated_at",
        )
        .bind(&edge.source_tool)
        .bind(&edge.target_tool)
        .bind(&edge.edge_type)
        .bind(&edge.edge_source)
        .bind(edge.weight)
        .bind(edge.count)
        .bind(edge.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_graph_edges(&self) -> Result<Vec<GraphEdgeRecord>> {
        let rows = sqlx::query(
            "SELECT source_tool, target_tool, edge_type, edge_source, weight, count, updated_at FROM graph_edges",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| GraphEdgeRecord {
                source_tool: row.get("source_tool"),
                target_tool: row.get("target_tool"),
                edge_type: row.get("edge_type"),
                edge_source: row.get("edge_source"),
                weight: row.get("weight"),
                count: row.get("count"),
                updated_at: row.get("updated_at"),
            })
            .collect())
    }

    async fn record_execution_trace(&self, trace: &ExecutionTraceRecord) -> Result<()> {
        let executed_path = serde_json::to_string(&trace.executed_path)?;
        let intent_embedding = trace.intent_embedding.as_ref().map(serde_json::to_string).transpose()?;
        sqlx::query(
            "INSERT INTO execution_trace (id, parent_trace_id, tool_id, executed_path, success, duration_ms, error_type, intent_embedding, executed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&trace.id)
        .bind(&trace.parent_trace_id)
        .bind(&trace.tool_id)
        .bind(executed_path)
        .bind(trace.success)
        .bind(trace.duration_ms)
        .bind(&trace.error_type)
        .bind(intent_embedding)
        .bind(trace.executed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_execution_traces_for_tool(&self, tool_id: &str) -> Result<Vec<ExecutionTraceRecord>> {
        let rows = sqlx::query(
            "SELECT id, parent_trace_id, tool_id, executed_path, success, duration_ms, error_type, intent_embedding, executed_at
             FROM execution_trace WHERE tool_id = ? ORDER BY executed_at DESC",
        )
        .bind(tool_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(execution_trace_from_row).collect()
    }

    async fn record_entropy_sample(&self, sample: &EntropySample) -> Result<()> {
        sqlx::query(
            "INSERT INTO entropy_history (id, recorded_at, node_count, edge_count, average_entropy) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&sample.id)
        .bind(sample.recorded_at)
        .bind(sample.node_count)
        .bind(sample.edge_count)
        .bind(sample.average_entropy)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_entropy_history(&self, limit: i64) -> Result<Vec<EntropySample>> {
        let rows = sqlx::query(
            "SELECT id, recorded_at, node_count, edge_count, average_entropy FROM entropy_history ORDER BY recorded_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| EntropySample {
                id: row.get("id"),
                recorded_at: row.get("recorded_at"),
                node_count: row.get("node_count"),
                edge_count: row.get("edge_count"),
                average_entropy: row.get("average_entropy"),
            })
            .collect())
    }
}

fn workflow_execution_from_row(row: sqlx::sqlite::SqliteRow) -> Result<WorkflowExecutionRecord> {
    let dag_json: String = row.get("dag_json");
    Ok(WorkflowExecutionRecord {
        id: row.get("id"),
        intent_text: row.get("intent_text"),
        dag_json: serde_json::from_str(&dag_json)?,
        success: row.get("success"),
        execution_time_ms: row.get("execution_time_ms"),
        error_message: row.get("error_message"),
        user_id: row.get("user_id"),
        executed_at: row.get("executed_at"),
    })
}

fn execution_trace_from_row(row: sqlx::sqlite::SqliteRow) -> Result<ExecutionTraceRecord> {
    let executed_path: String = row.get("executed_path");
    let intent_embedding: Option<String> = row.get("intent_embedding");
    Ok(ExecutionTraceRecord {
        id: row.get("id"),
        parent_trace_id: row.get("parent_trace_id"),
        tool_id: row.get("tool_id"),
        executed_path: serde_json::from_str(&executed_path)?,
        success: row.get("success"),
        duration_ms: row.get("duration_ms"),
        error_type: row.get("error_type"),
        intent_embedding: intent_embedding.map(|s| serde_json::from_str(&s)).transpose()?,
        executed_at: row.get("executed_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn client() -> SqliteDbClient {
        SqliteDbClient::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn round_trips_a_workflow_execution() {
        let client = client().await;
        let record = WorkflowExecutionRecord {
            id: "wf-1".into(),
            intent_text: "deploy service".into(),
            dag_json: json!({"tasks": []}),
            success: true,
            execution_time_ms: 120,
            error_message: None,
            user_id: Some("u-1".into()),
            executed_at: 1_700_000_000,
        };
        client.record_workflow_execution(&record).await.unwrap();
        let fetched = client.get_workflow_execution("wf-1").await.unwrap().unwrap();
        assert_eq!(fetched.intent_text, "deploy service");
        assert!(fetched.success);
    }

    #[tokio::test]
    async fn upserting_a_graph_edge_updates_existing_row() {
        let client = client().await;
        let mut edge = GraphEdgeRecord {
            source_tool: "a:op".into(),
            target_tool: "b:op".into(),
            edge_type: "dependency".into(),
            edge_source: "inferred".into(),
            weight: 0.5,
            count: 1,
            updated_at: 1,
        };
        client.upsert_graph_edge(&edge).await.unwrap();
        edge.count = 4;
        edge.edge_source = "observed".into();
        client.upsert_graph_edge(&edge).await.unwrap();

        let edges = client.list_graph_edges().await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].count, 4);
        assert_eq!(edges[0].edge_source, "observed");
    }

    #[tokio::test]
    async fn lists_traces_scoped_to_a_tool() {
        let client = client().await;
        let trace = ExecutionTraceRecord {
            id: "t-1".into(),
            parent_trace_id: None,
            tool_id: "fs:read".into(),
            executed_path: vec!["fs:read".into()],
            success: true,
            duration_ms: 5,
            error_type: None,
            intent_embedding: None,
            executed_at: 1,
        };
        client.record_execution_trace(&trace).await.unwrap();
        let traces = client.list_execution_traces_for_tool("fs:read").await.unwrap();
        assert_eq!(traces.len(), 1);
        assert!(client.list_execution_traces_for_tool("fs:write").await.unwrap().is_empty());
    }
}
