//! Feeds a completed workflow into the GraphRAG learning core once
//! execution finishes, and persists the resulting edges/traces through
//! [`DbClient`] so a restarted server can rebuild its graph from
//! history rather than starting cold.

use std::collections::HashMap;

use dagctl_core::{Dag, TaskStatus, WorkflowState};
use dagctl_graphrag::{EdgeSource, EdgeType, ExecutedEdge, ExecutedTask, GraphRagStore};

use crate::db::models::{ExecutionTraceRecord, GraphEdgeRecord};
use crate::db::DbClient;
use crate::error::Result;

pub async fn record_completed_workflow(
    graphrag: &GraphRagStore,
    db: &dyn DbClient,
    dag: &Dag,
    state: &WorkflowState,
) -> Result<()> {
    let tool_by_id: HashMap<&str, &str> = dag.tasks.iter().map(|t| (t.id.as_str(), t.tool.as_str())).collect();

    let mut dependency_edges = Vec::new();
    for task in &dag.tasks {
        for dep in &task.depends_on {
            if let (Some(&source_tool), Some(&target_tool)) = (tool_by_id.get(dep.as_str()), tool_by_id.get(task.id.as_str())) {
                dependency_edges.push(ExecutedEdge {
                    source_tool: source_tool.to_string(),
                    target_tool: target_tool.to_string(),
                    edge_type: EdgeType::Dependency,
                    source: EdgeSource::Observed,
                });
            }
        }
    }

    let executed_tasks: Vec<ExecutedTask> = state
        .tasks
        .iter()
        .filter_map(|result| {
            let tool = tool_by_id.get(result.task_id.as_str())?;
            Some(ExecutedTask {
                tool: tool.to_string(),
                layer_index: result.layer_index.unwrap_or(0),
                sub_trace: Vec::new(),
            })
        })
        .collect();

    graphrag.record_execution(&dependency_edges, &executed_tasks);

    let snapshot = graphrag.snapshot();
    for tool_id in snapshot.graph.tool_ids() {
        for (neighbor, edge) in snapshot.graph.neighbors_out(&tool_id) {
            db.upsert_graph_edge(&GraphEdgeRecord {
                source_tool: tool_id.clone(),
                target_tool: neighbor,
                edge_type: format!("{:?}", edge.edge_type).to_lowercase(),
                edge_source: format!("{:?}", edge.source).to_lowercase(),
                weight: edge.weight,
                count: edge.count as i64,
                updated_at: chrono::Utc::now().timestamp_millis(),
            })
            .await?;
        }
    }

    for result in &state.tasks {
        let Some(&tool) = tool_by_id.get(result.task_id.as_str()) else { continue };
        db.record_execution_trace(&ExecutionTraceRecord {
            id: uuid::Uuid::new_v4().to_string(),
            parent_trace_id: None,
            tool_id: tool.to_string(),
            executed_path: vec![tool.to_string()],
            success: result.status == TaskStatus::Success,
            duration_ms: result.execution_time_ms.unwrap_or(0) as i64,
            error_type: result.error.clone(),
            intent_embedding: None,
            executed_at: chrono::Utc::now().timestamp_millis(),
        })
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagctl_core::{Task, TaskKind, TaskResult};
    use dagctl_graphrag::{Graph, GraphRagStore, Hypergraph, ShgatParams};

    struct NullDb;

    #[async_trait::async_trait]
    impl DbClient for NullDb {
        async fn record_workflow_execution(&self, _: &crate::db::models::WorkflowExecutionRecord) -> Result<()> { Ok(()) }
        async fn list_workflow_executions(&self, _: i64) -> Result<Vec<crate::db::models::WorkflowExecutionRecord>> { Ok(vec![]) }
        async fn get_workflow_execution(&self, _: &str) -> Result<Option<crate::db::models::WorkflowExecutionRecord>> { Ok(None) }
        async fn upsert_graph_edge(&self, _: &GraphEdgeRecord) -> Result<()> { Ok(()) }
        async fn list_graph_edges(&self) -> Result<Vec<GraphEdgeRecord>> { Ok(vec![]) }
        async fn record_execution_trace(&self, _: &ExecutionTraceRecord) -> Result<()> { Ok(()) }
        async fn list_execution_traces_for_tool(&self, _: &str) -> Result<Vec<ExecutionTraceRecord>> { Ok(vec![]) }
        async fn record_entropy_sample(&self, _: &crate::db::models::EntropySample) -> Result<()> { Ok(()) }
        async fn recent_entropy_history(&self, _: i64) -> Result<Vec<crate::db::models::EntropySample>> { Ok(vec![]) }
    }

    #[tokio::test]
    async fn feeds_dependency_edges_into_the_graph() {
        let store = GraphRagStore::new(Graph::new(), Hypergraph::new(), ShgatParams::new(4, 2, 4, 1));
        let dag = Dag::new(vec![
            Task::new("t1", "fs:read", TaskKind::McpTool),
            Task::new("t2", "fs:write", TaskKind::McpTool).depends_on(["t1"]),
        ])
        .unwrap();
        let mut state = WorkflowState::new("wf-1");
        state.tasks.push(TaskResult::success("t1", serde_json::json!(null), 5, 0));
        state.tasks.push(TaskResult::success("t2", serde_json::json!(null), 5, 1));

        record_completed_workflow(&store, &NullDb, &dag, &state).await.unwrap();
        let snapshot = store.snapshot();
        assert!(snapshot.graph.edge("fs:read", "fs:write").is_some());
    }
}
