//! Default collaborator implementations the server wires into the
//! [`dagctl_core::Scheduler`] when no embedder supplies their own. Real
//! tool/sandbox/capability/planner integrations are out of scope here —
//! these exist only so `POST /workflows` has something runnable out of
//! the box, in the same spirit as the `EchoTool`/`Noop*` fixtures
//! `dagctl-core`'s own integration tests use.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use dagctl_core::{CapabilityExecutor, Dag, Planner, SandboxConfig, SandboxRunner, TaskFailure, ToolExecutor};

/// Echoes `{tool, args}` back as the call's output. Lets a caller
/// exercise layering, dependency resolution and checkpointing against a
/// live server without an external tool backend.
pub struct EchoToolExecutor;

#[async_trait]
impl ToolExecutor for EchoToolExecutor {
    async fn call(&self, tool: &str, args: HashMap<String, Value>) -> Result<Value, TaskFailure> {
        Ok(serde_json::json!({ "tool": tool, "args": args }))
    }
}

pub struct NoopSandboxRunner;

#[async_trait]
impl SandboxRunner for NoopSandboxRunner {
    async fn run(
        &self,
        _code: &str,
        _args: HashMap<String, Value>,
        _context: HashMap<String, Value>,
        _sandbox: Option<&SandboxConfig>,
    ) -> Result<Value, TaskFailure> {
        Ok(Value::Null)
    }
}

pub struct NoopCapabilityExecutor;

#[async_trait]
impl CapabilityExecutor for NoopCapabilityExecutor {
    async fn invoke(&self, _capability_id: &str, _args: HashMap<String, Value>) -> Result<Value, TaskFailure> {
        Ok(Value::Null)
    }
}

/// Declines every replan request by returning the empty DAG, which the
/// scheduler treats as a no-op replan.
pub struct DecliningPlanner;

#[async_trait]
impl Planner for DecliningPlanner {
    async fn replan(
        &self,
        _completed_tasks: &[String],
        _new_requirement: &str,
        _available_context: &HashMap<String, Value>,
    ) -> Result<Dag, TaskFailure> {
        Ok(Dag { tasks: Vec::new() })
    }
}
