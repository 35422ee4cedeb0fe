//! Error taxonomy for DAG execution.
//!
//! Mirrors the propagation policy of the executor: task-level failures
//! are collected into [`crate::result::TaskResult`]s and never raised as
//! Rust errors. Only the conditions that must halt the whole run —
//! malformed graphs and decision-gate failures — surface here.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExecutorError>;

/// Fatal errors raised by the scheduler or decision loops.
///
/// Everything else (dependency failures, per-task timeouts, permission
/// escalations, checkpoint/learning errors) is recoverable and is
/// represented as data (a [`crate::result::TaskStatus`] or a logged,
/// swallowed error), not as an `Err` from the public API.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The DAG contains a cycle; layering via Kahn's algorithm could not
    /// place every task. Non-recoverable: no events are emitted beyond
    /// `workflow_start`.
    #[error("circular dependency detected among tasks: {0:?}")]
    CircularDependency(Vec<String>),

    /// A decision gate (AIL or HIL) did not receive a response within
    /// its configured timeout.
    #[error("decision timeout waiting for {gate} response at layer {layer}")]
    DecisionTimeout { gate: &'static str, layer: usize },

    /// The workflow was aborted by an agent-in-the-loop response.
    #[error("workflow aborted by agent: {reason}")]
    AbortedByAgent { reason: String },

    /// The workflow was aborted by a human-in-the-loop rejection.
    #[error("workflow aborted by human reviewer: {reason}")]
    AbortedByHuman { reason: String },

    /// A checkpoint id given to `resume_from_checkpoint` does not exist.
    #[error("checkpoint not found: {0}")]
    CheckpointNotFound(String),

    /// The DAG given to `resume_from_checkpoint` doesn't match the one
    /// that produced the checkpoint closely enough to resume (task set
    /// mismatch beyond what replan bookkeeping can reconcile).
    #[error("dag does not match checkpointed workflow: {0}")]
    DagMismatch(String),

    /// A caller-supplied command failed shape validation at enqueue
    /// time.
    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

/// Recoverable per-task failure reasons, carried inside a `TaskResult`
/// rather than raised. Kept as a typed enum (vs. a bare string) so
/// downstream dependency checks and tests can match on the kind of
/// failure without parsing messages.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum TaskFailure {
    #[error("dependency {0} failed")]
    DependencyFailed(String),

    #[error("reference to undefined task: {0}")]
    ReferenceToUndefinedTask(String),

    #[error("reference to failed task: {0}")]
    ReferenceToFailedTask(String),

    #[error("task timed out after {0}ms")]
    Timeout(u64),

    #[error("permission denied: operation {operation} requires {requested:?}, current set is {current:?}")]
    PermissionDenied {
        operation: String,
        current: Vec<String>,
        requested: Vec<String>,
    },

    #[error("tool execution failed: {0}")]
    ToolError(String),

    /// A non-fatal failure an executor has already classified as safe
    /// to swallow. Maps to `TaskStatus::FailedSafe`, never retried or
    /// escalated: the executor has already decided the workflow should
    /// proceed past it.
    #[error("recoverable failure: {0}")]
    Recoverable(String),
}
