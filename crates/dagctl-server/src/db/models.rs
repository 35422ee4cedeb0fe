//! Row types for the persistent schema, narrowed
//! to what the HTTP surface and the GraphRAG learning step actually
//! read back. Modeled on `orchestrator::db::models`'s plain-struct
//! style (no derive-heavy ORM, hand-written `FromRow` via positional
//! column access in `db::client`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecutionRecord {
    pub id: String,
    pub intent_text: String,
    pub dag_json: serde_json::Value,
    pub success: bool,
    pub execution_time_ms: i64,
    pub error_message: Option<String>,
    pub user_id: Option<String>,
    pub executed_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdgeRecord {
    pub source_tool: String,
    pub target_tool: String,
    pub edge_type: String,
    pub edge_source: String,
    pub weight: f64,
    pub count: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTraceRecord {
    pub id: String,
    pub parent_trace_id: Option<String>,
    pub tool_id: String,
    pub executed_path: Vec<String>,
    pub success: bool,
    pub duration_ms: i64,
    pub error_type: Option<String>,
    pub intent_embedding: Option<Vec<f64>>,
    pub executed_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntropySample {
    pub id: String,
    pub recorded_at: i64,
    pub node_count: i64,
    pub edge_count: i64,
    pub average_entropy: f64,
}
