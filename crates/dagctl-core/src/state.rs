//! [`WorkflowState`] and its reducers.
//!
//! Reducers are pure functions `State x Update -> State`: `tasks`
//! appends (last-writer-wins per `task_id`), `messages`/`decisions`
//! append-only, `context` shallow-merges. Purity means replaying a
//! sequence of updates against a restored state is deterministic,
//! which is what makes checkpoint resume correct.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::event::StateUpdateSummary;
use crate::result::TaskResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub layer: usize,
    pub kind: String,
    pub outcome: String,
    pub timestamp: i64,
}

/// A single mutation applied to a [`WorkflowState`] by the scheduler or
/// by a caller via `update_state`. Kept as an explicit struct (not a
/// free-form JSON patch) so reducers stay pure and exhaustive.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub new_tasks: Vec<TaskResult>,
    pub new_messages: Vec<String>,
    pub new_decisions: Vec<Decision>,
    pub context_merge: HashMap<String, serde_json::Value>,
    pub note: Option<String>,
    pub replan: bool,
    pub replan_noop: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub workflow_id: String,
    pub current_layer: usize,
    /// Insertion order mirrors event emission order for these task ids
    /// Invariant: ids stay unique within a workflow.
    pub tasks: Vec<TaskResult>,
    pub messages: Vec<String>,
    pub decisions: Vec<Decision>,
    pub context: HashMap<String, serde_json::Value>,
    pub replan_count: u32,
    pub replan_noop_count: u32,
}

impl WorkflowState {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            current_layer: 0,
            tasks: Vec::new(),
            messages: Vec::new(),
            decisions: Vec::new(),
            context: HashMap::new(),
            replan_count: 0,
            replan_noop_count: 0,
        }
    }

    /// Applies an update and returns a summary naming the counts of
    /// added items, which becomes the payload of a `state_updated`
    /// event.
    pub fn apply(&mut self, update: StateUpdate) -> StateUpdateSummary {
        let mut added_tasks = 0;
        for result in update.new_tasks {
            if let Some(existing) = self.tasks.iter_mut().find(|t| t.task_id == result.task_id) {
                *existing = result;
            } else {
                self.tasks.push(result);
                added_tasks += 1;
            }
        }

        let added_messages = update.new_messages.len();
        self.messages.extend(update.new_messages);

        let added_decisions = update.new_decisions.len();
        self.decisions.extend(update.new_decisions);

        let context_keys_merged = update.context_merge.len();
        self.context.extend(update.context_merge);

        if update.replan {
            self.replan_count += 1;
        }
        if update.replan_noop {
            self.replan_noop_count += 1;
        }

        StateUpdateSummary {
            added_tasks,
            added_messages,
            added_decisions,
            context_keys_merged,
            note: update.note,
        }
    }

    pub fn result_for(&self, task_id: &str) -> Option<&TaskResult> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }

    pub fn results_by_id(&self) -> HashMap<String, TaskResult> {
        self.tasks.iter().map(|t| (t.task_id.clone(), t.clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::TaskStatus;

    #[test]
    fn tasks_reducer_is_last_writer_wins() {
        let mut state = WorkflowState::new("wf-1");
        state.apply(StateUpdate {
            new_tasks: vec![TaskResult::success("task_a", serde_json::json!(1), 5, 0)],
            ..Default::default()
        });
        let summary = state.apply(StateUpdate {
            new_tasks: vec![TaskResult::error("task_a", "retry failed", 0)],
            ..Default::default()
        });
        assert_eq!(summary.added_tasks, 0);
        assert_eq!(state.tasks.len(), 1);
        assert_eq!(state.tasks[0].status, TaskStatus::Error);
    }

    #[test]
    fn context_reducer_shallow_merges() {
        let mut state = WorkflowState::new("wf-1");
        state.apply(StateUpdate {
            context_merge: HashMap::from([("a".to_string(), serde_json::json!(1))]),
            ..Default::default()
        });
        state.apply(StateUpdate {
            context_merge: HashMap::from([("b".to_string(), serde_json::json!(2))]),
            ..Default::default()
        });
        assert_eq!(state.context.len(), 2);
    }

    #[test]
    fn messages_and_decisions_append_only() {
        let mut state = WorkflowState::new("wf-1");
        state.apply(StateUpdate {
            new_messages: vec!["hello".to_string()],
            ..Default::default()
        });
        state.apply(StateUpdate {
            new_messages: vec!["world".to_string()],
            ..Default::default()
        });
        assert_eq!(state.messages, vec!["hello", "world"]);
    }
}
