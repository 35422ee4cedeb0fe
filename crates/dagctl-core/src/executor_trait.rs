//! External collaborator interfaces.
//!
//! These traits are the narrow seams through which the executor talks
//! to the outside world it does not implement itself: the real tool
//! call, the untrusted-code sandbox, and a planner for replans. No
//! retry is performed by these traits themselves — retry policy lives
//! in [`crate::scheduler`].

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::TaskFailure;
use crate::task::{Dag, SandboxConfig};

/// `fn(tool, args) -> any`, consumed per `mcp_tool` task.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn call(&self, tool: &str, args: HashMap<String, Value>) -> Result<Value, TaskFailure>;
}

/// The untrusted-code worker-bridge, consumed per `code_execution` task.
/// Dependency outputs are bound into `context` ahead of invocation.
#[async_trait]
pub trait SandboxRunner: Send + Sync {
    async fn run(
        &self,
        code: &str,
        args: HashMap<String, Value>,
        context: HashMap<String, Value>,
        sandbox: Option<&SandboxConfig>,
    ) -> Result<Value, TaskFailure>;
}

/// Delegate for `capability` tasks. May recursively invoke an inner DAG;
/// that recursion is opaque to the scheduler.
#[async_trait]
pub trait CapabilityExecutor: Send + Sync {
    async fn invoke(&self, capability_id: &str, args: HashMap<String, Value>) -> Result<Value, TaskFailure>;
}

/// External replanner consumed by the `replan_dag` AIL response.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn replan(
        &self,
        completed_tasks: &[String],
        new_requirement: &str,
        available_context: &HashMap<String, Value>,
    ) -> Result<Dag, TaskFailure>;
}

/// Recognizes a permission-denial failure and extracts the structured
/// fields needed to build an escalation decision. Dispatches on a
/// stable string discriminator rather than error type identity or an
/// instance flag, which would not survive crossing a module boundary.
pub trait PermissionClassifier: Send + Sync {
    fn classify(&self, failure: &TaskFailure) -> Option<PermissionEscalation>;
}

#[derive(Debug, Clone)]
pub struct PermissionEscalation {
    pub current: Vec<String>,
    pub requested: Vec<String>,
    pub detected_operation: String,
    pub suggested_alternative: Option<String>,
}

/// Default classifier: matches `TaskFailure::PermissionDenied` only.
pub struct DefaultPermissionClassifier;

impl PermissionClassifier for DefaultPermissionClassifier {
    fn classify(&self, failure: &TaskFailure) -> Option<PermissionEscalation> {
        match failure {
            TaskFailure::PermissionDenied { current, requested, operation } => Some(PermissionEscalation {
                current: current.clone(),
                requested: requested.clone(),
                detected_operation: operation.clone(),
                suggested_alternative: None,
            }),
            _ => None,
        }
    }
}
