//! The [`ExecutionEvent`] stream emitted by a running workflow.
//!
//! Every event carries `workflow_id`, `timestamp` and a monotonically
//! increasing `sequence` within the run — the total order observers
//! rely on.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Ail,
    Hil,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionContext {
    pub kind: DecisionKind,
    pub layer: usize,
    /// Present only for a permission-escalation-driven decision.
    pub task_id: Option<String>,
    pub current_permissions: Option<Vec<String>>,
    pub requested_permissions: Option<Vec<String>>,
    pub detected_operation: Option<String>,
    pub suggested_alternative: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionEventKind {
    WorkflowStart {
        total_layers: Option<usize>,
    },
    LayerStart {
        layer: usize,
        task_ids: Vec<String>,
    },
    TaskStart {
        task_id: String,
        layer: usize,
    },
    TaskComplete {
        task_id: String,
        layer: usize,
        execution_time_ms: u64,
    },
    TaskError {
        task_id: String,
        layer: Option<usize>,
        error: String,
    },
    TaskWarning {
        task_id: String,
        message: String,
    },
    StateUpdated {
        added_tasks: usize,
        added_messages: usize,
        added_decisions: usize,
        context_keys_merged: usize,
        /// Non-empty only when this update records a no-op replan.
        note: Option<String>,
    },
    Checkpoint {
        checkpoint_id: String,
        layer: usize,
    },
    DecisionRequired {
        decision: DecisionContext,
    },
    WorkflowComplete {
        successful_tasks: usize,
        failed_tasks: usize,
    },
    WorkflowAbort {
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub workflow_id: String,
    pub timestamp: i64,
    pub sequence: u64,
    pub kind: ExecutionEventKind,
}

/// Summary of a single reducer application, naming the counts of items
/// it added.
#[derive(Debug, Clone, Default)]
pub struct StateUpdateSummary {
    pub added_tasks: usize,
    pub added_messages: usize,
    pub added_decisions: usize,
    pub context_keys_merged: usize,
    pub note: Option<String>,
}

impl From<StateUpdateSummary> for ExecutionEventKind {
    fn from(s: StateUpdateSummary) -> Self {
        ExecutionEventKind::StateUpdated {
            added_tasks: s.added_tasks,
            added_messages: s.added_messages,
            added_decisions: s.added_decisions,
            context_keys_merged: s.context_keys_merged,
            note: s.note,
        }
    }
}
