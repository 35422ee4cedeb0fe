//! Per-task and whole-run result types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Success,
    Error,
    /// Failed but the workflow proceeds; downstream tasks see `output`
    /// (possibly `null`) rather than a dependency failure.
    FailedSafe,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub status: TaskStatus,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
    pub execution_time_ms: Option<u64>,
    pub layer_index: Option<usize>,
}

impl TaskResult {
    pub fn success(task_id: impl Into<String>, output: serde_json::Value, ms: u64, layer: usize) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Success,
            output: Some(output),
            error: None,
            execution_time_ms: Some(ms),
            layer_index: Some(layer),
        }
    }

    pub fn error(task_id: impl Into<String>, error: impl Into<String>, layer: usize) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Error,
            output: None,
            error: Some(error.into()),
            execution_time_ms: None,
            layer_index: Some(layer),
        }
    }

    pub fn failed_safe(task_id: impl Into<String>, output: Option<serde_json::Value>, layer: usize) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::FailedSafe,
            output,
            error: None,
            execution_time_ms: None,
            layer_index: Some(layer),
        }
    }
}

/// Terminal summary returned by the non-interactive `execute` entry
/// point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DagExecutionResult {
    pub workflow_id: String,
    pub total_tasks: usize,
    pub successful_tasks: usize,
    pub failed_tasks: usize,
    pub parallelization_layers: usize,
    pub speedup: f64,
    pub errors: HashMap<String, String>,
    pub replan_count: u32,
    pub replan_noop_count: u32,
}
