//! Controlled DAG execution: topological scheduling over independent
//! work, a lazily-pulled event stream, an out-of-band command queue,
//! checkpointed state, and the agent-in-the-loop / human-in-the-loop
//! decision gates that sit between layers.
//!
//! The entry points are [`Scheduler::execute`] (fire-and-forget, for
//! fully automated runs) and [`Scheduler::execute_stream`] /
//! [`Scheduler::resume_from_checkpoint`] (interactive: caller pulls
//! [`ExecutionEvent`]s and pushes [`Command`]s through the returned
//! [`RunHandle`]).

pub mod argument;
pub mod command;
pub mod config;
pub mod decision;
pub mod error;
pub mod event;
pub mod executor_trait;
pub mod ratelimit;
pub mod result;
pub mod scheduler;
pub mod state;
pub mod task;

pub use command::{Command, CommandQueue, CommandSender};
pub use config::{AilConfig, AilDecisionPoint, Concurrency, ExecutorConfig, HilApprovalRequired, HilConfig, RetryConfig, TimeoutsConfig};
pub use decision::{AilOutcome, EscalationOutcome, HilOutcome};
pub use error::{ExecutorError, Result, TaskFailure};
pub use event::{DecisionContext, DecisionKind, ExecutionEvent, ExecutionEventKind, StateUpdateSummary};
pub use executor_trait::{CapabilityExecutor, DefaultPermissionClassifier, PermissionClassifier, PermissionEscalation, Planner, SandboxRunner, ToolExecutor};
pub use ratelimit::KeyedRateLimiter;
pub use result::{DagExecutionResult, TaskResult, TaskStatus};
pub use scheduler::{RunHandle, Scheduler};
pub use state::{Decision, StateUpdate, WorkflowState};
pub use task::{ArgumentValue, Dag, SandboxConfig, Task, TaskKind};
