//! Task and DAG data types.
//!
//! A [`Dag`] is the unit of submission: an acyclic set of [`Task`]s plus
//! the `depends_on` edges implied by each task. Tasks are immutable once
//! accepted; a replan produces a brand new `Dag` rather than mutating
//! this one in place.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::{ExecutorError, Result};

/// Discriminates how a task is dispatched. Kept as a tagged enum (not a
/// trait object) so the scheduler can pattern-match exhaustively at the
/// dispatch seam instead of paying for dynamic dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    McpTool,
    CodeExecution,
    Capability,
}

/// Sandbox configuration attached to `code_execution` tasks. Fields are
/// intentionally opaque strings/flags; the actual sandbox is an external
/// worker-bridge consumed through [`crate::executor::SandboxRunner`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SandboxConfig {
    pub runtime: Option<String>,
    pub network: bool,
    pub env_allowlist: Vec<String>,
}

/// A single argument value as accepted from a DAG submission. Both the
/// structured and legacy representations are kept as variants of the
/// same enum so resolution can dispatch on one type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArgumentValue {
    Literal { value: serde_json::Value },
    Reference { expression: String },
    Parameter { parameter_name: String },
    /// Legacy `$OUTPUT[task_id](.path)?` strings, recognized during
    /// resolution by pattern, not by this tag — present so raw JSON
    /// input that only supplies a bare string still deserializes.
    #[serde(skip)]
    Legacy(String),
    /// A nested object or array of further argument values, resolved
    /// recursively.
    Object(HashMap<String, ArgumentValue>),
    Array(Vec<ArgumentValue>),
}

impl ArgumentValue {
    /// Accepts a plain `serde_json::Value` as shorthand for a literal,
    /// or a legacy `$OUTPUT[...]` string, or a structured value already
    /// matching the tagged shape above.
    pub fn from_json(value: serde_json::Value) -> Self {
        if let serde_json::Value::String(ref s) = value {
            if s.starts_with("$OUTPUT[") {
                return ArgumentValue::Legacy(s.clone());
            }
        }
        if let serde_json::Value::Object(ref map) = value {
            if map.contains_key("type") {
                if let Ok(parsed) = serde_json::from_value::<ArgumentValue>(value.clone()) {
                    return parsed;
                }
            }
        }
        ArgumentValue::Literal { value }
    }
}

/// A node in the DAG. `id` must be unique within the owning [`Dag`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    /// Opaque tool selector, e.g. `"server:op"` or `"capability:uuid"`.
    pub tool: String,
    pub arguments: HashMap<String, ArgumentValue>,
    pub depends_on: Vec<String>,
    pub kind: TaskKind,
    #[serde(default)]
    pub sandbox: Option<SandboxConfig>,
    /// Marks the task as side-effecting for the HIL `critical_only`
    /// trigger.
    #[serde(default)]
    pub has_side_effects: bool,
}

impl Task {
    pub fn new(id: impl Into<String>, tool: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            id: id.into(),
            tool: tool.into(),
            arguments: HashMap::new(),
            depends_on: Vec::new(),
            kind,
            sandbox: None,
            has_side_effects: false,
        }
    }

    pub fn side_effecting(mut self) -> Self {
        self.has_side_effects = true;
        self
    }

    pub fn depends_on(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.depends_on = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: ArgumentValue) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }
}

/// An acyclic set of tasks. Construction validates that every
/// `depends_on` id resolves and the graph has no cycle (checked lazily
/// by [`Dag::layers`], since cycle detection and layering are the same
/// traversal).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dag {
    pub tasks: Vec<Task>,
}

impl Dag {
    pub fn new(tasks: Vec<Task>) -> Result<Self> {
        let ids: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        for task in &tasks {
            for dep in &task.depends_on {
                if !ids.contains(dep.as_str()) {
                    return Err(ExecutorError::DagMismatch(format!(
                        "task {} depends on unknown task {}",
                        task.id, dep
                    )));
                }
            }
        }
        Ok(Self { tasks })
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Compute topological layers via Kahn's algorithm.
    ///
    /// Layer 0 is every task with no unmet dependency; layer `k+1` is
    /// every task whose dependencies are all satisfied by layers `<= k`.
    /// Ties within a layer are broken by insertion order in `self.tasks`,
    /// matching the order events are emitted in.
    pub fn layers(&self) -> Result<Vec<Vec<String>>> {
        let mut remaining: HashMap<&str, usize> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for task in &self.tasks {
            remaining.insert(task.id.as_str(), task.depends_on.len());
            for dep in &task.depends_on {
                dependents.entry(dep.as_str()).or_default().push(task.id.as_str());
            }
        }

        let mut layers = Vec::new();
        let mut placed: HashSet<&str> = HashSet::new();
        loop {
            let mut layer: Vec<&str> = self
                .tasks
                .iter()
                .map(|t| t.id.as_str())
                .filter(|id| !placed.contains(id) && remaining[id] == 0)
                .collect();
            if layer.is_empty() {
                break;
            }
            // Preserve DAG insertion order within the layer.
            layer.sort_by_key(|id| self.tasks.iter().position(|t| t.id == *id).unwrap());

            for id in &layer {
                placed.insert(id);
                if let Some(deps) = dependents.get(id) {
                    for dependent in deps {
                        if let Some(count) = remaining.get_mut(dependent) {
                            *count = count.saturating_sub(1);
                        }
                    }
                }
            }
            layers.push(layer.into_iter().map(String::from).collect());
        }

        if placed.len() != self.tasks.len() {
            let stuck: Vec<String> = self
                .tasks
                .iter()
                .map(|t| t.id.clone())
                .filter(|id| !placed.contains(id.as_str()))
                .collect();
            return Err(ExecutorError::CircularDependency(stuck));
        }

        Ok(layers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, deps: &[&str]) -> Task {
        Task::new(id, "noop:run", TaskKind::McpTool).depends_on(deps.to_vec())
    }

    #[test]
    fn layers_respect_dependencies() {
        let dag = Dag::new(vec![
            task("A", &[]),
            task("B", &["A"]),
            task("C", &["A"]),
            task("D", &["B", "C"]),
        ])
        .unwrap();
        let layers = dag.layers().unwrap();
        assert_eq!(layers, vec![vec!["A"], vec!["B", "C"], vec!["D"]]);
    }

    #[test]
    fn cycle_is_rejected() {
        let dag = Dag::new(vec![task("A", &["B"]), task("B", &["A"])]).unwrap();
        let err = dag.layers().unwrap_err();
        assert!(matches!(err, ExecutorError::CircularDependency(_)));
    }

    #[test]
    fn unknown_dependency_rejected_at_construction() {
        let err = Dag::new(vec![task("A", &["ghost"])]).unwrap_err();
        assert!(matches!(err, ExecutorError::DagMismatch(_)));
    }
}
