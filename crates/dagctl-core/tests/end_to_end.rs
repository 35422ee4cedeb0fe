//! End-to-end scheduler scenarios, exercising the scheduler, decision
//! gates, and checkpoint resume together rather than unit-by-unit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};

use dagctl_checkpoint::InMemoryCheckpointStore;
use dagctl_core::{
    AilConfig, AilDecisionPoint, Command, Dag, DefaultPermissionClassifier, ExecutionEventKind, ExecutorConfig,
    HilApprovalRequired, HilConfig, RetryConfig, Scheduler, Task, TaskFailure, TaskKind, TaskStatus,
};

/// No backoff delay, so tests that exercise a permanently failing tool
/// don't pay the default retry schedule's wall-clock cost.
fn fast_retry() -> RetryConfig {
    RetryConfig { max_attempts: 1, initial_interval_ms: 0, backoff_factor: 1.0, max_interval_ms: 0, jitter: false }
}

struct EchoTool;

#[async_trait]
impl dagctl_core::ToolExecutor for EchoTool {
    async fn call(&self, tool: &str, args: HashMap<String, Value>) -> Result<Value, TaskFailure> {
        if tool == "fail:tool" {
            return Err(TaskFailure::ToolError("injected failure".to_string()));
        }
        Ok(json!({"tool": tool, "args": args}))
    }
}

/// Fails `fails_before_success` times with a transient `ToolError`,
/// then succeeds.
struct FlakyTool {
    fails_before_success: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl dagctl_core::ToolExecutor for FlakyTool {
    async fn call(&self, tool: &str, args: HashMap<String, Value>) -> Result<Value, TaskFailure> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.fails_before_success {
            return Err(TaskFailure::ToolError(format!("flaky failure {n}")));
        }
        Ok(json!({"tool": tool, "args": args, "attempt": n + 1}))
    }
}

/// Always returns a recoverable failure, modeling a tool whose
/// executor has already decided the workflow should not be blocked.
struct RecoverableTool;

#[async_trait]
impl dagctl_core::ToolExecutor for RecoverableTool {
    async fn call(&self, _tool: &str, _args: HashMap<String, Value>) -> Result<Value, TaskFailure> {
        Err(TaskFailure::Recoverable("best-effort step skipped".to_string()))
    }
}

/// Records how many calls are in flight concurrently, to verify a
/// bounded-concurrency config actually caps dispatch.
struct ConcurrencyTrackingTool {
    in_flight: Arc<AtomicUsize>,
    max_observed: Arc<AtomicUsize>,
}

#[async_trait]
impl dagctl_core::ToolExecutor for ConcurrencyTrackingTool {
    async fn call(&self, tool: &str, args: HashMap<String, Value>) -> Result<Value, TaskFailure> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_observed.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(json!({"tool": tool, "args": args}))
    }
}

struct NoopSandbox;

#[async_trait]
impl dagctl_core::SandboxRunner for NoopSandbox {
    async fn run(
        &self,
        _code: &str,
        _args: HashMap<String, Value>,
        _context: HashMap<String, Value>,
        _sandbox: Option<&dagctl_core::SandboxConfig>,
    ) -> Result<Value, TaskFailure> {
        Ok(Value::Null)
    }
}

struct NoopCapability;

#[async_trait]
impl dagctl_core::CapabilityExecutor for NoopCapability {
    async fn invoke(&self, _capability_id: &str, _args: HashMap<String, Value>) -> Result<Value, TaskFailure> {
        Ok(Value::Null)
    }
}

struct NoopPlanner;

#[async_trait]
impl dagctl_core::Planner for NoopPlanner {
    async fn replan(
        &self,
        _completed_tasks: &[String],
        _new_requirement: &str,
        _available_context: &HashMap<String, Value>,
    ) -> Result<Dag, TaskFailure> {
        Err(TaskFailure::ToolError("no planner configured".to_string()))
    }
}

/// Denies a guarded tool exactly once, then allows it — models a tool
/// that requires an operator to elevate permissions before it retries.
struct GuardedOnceTool {
    calls: AtomicUsize,
}

#[async_trait]
impl dagctl_core::ToolExecutor for GuardedOnceTool {
    async fn call(&self, tool: &str, args: HashMap<String, Value>) -> Result<Value, TaskFailure> {
        if tool == "guarded:write" {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                return Err(TaskFailure::PermissionDenied {
                    operation: "write".to_string(),
                    current: vec!["read".to_string()],
                    requested: vec!["read".to_string(), "write".to_string()],
                });
            }
            return Ok(json!({"written": true}));
        }
        Ok(json!({"tool": tool, "args": args}))
    }
}

struct ExtendingPlanner;

#[async_trait]
impl dagctl_core::Planner for ExtendingPlanner {
    async fn replan(
        &self,
        _completed_tasks: &[String],
        _new_requirement: &str,
        _available_context: &HashMap<String, Value>,
    ) -> Result<Dag, TaskFailure> {
        Dag::new(vec![
            Task::new("A", "noop:run", TaskKind::McpTool),
            Task::new("B", "noop:run", TaskKind::McpTool).depends_on(["A"]),
        ])
        .map_err(|e| TaskFailure::ToolError(e.to_string()))
    }
}

fn scheduler(config: ExecutorConfig) -> Arc<Scheduler> {
    Arc::new(Scheduler::new(
        config,
        Arc::new(EchoTool),
        Arc::new(NoopSandbox),
        Arc::new(NoopCapability),
        Arc::new(NoopPlanner),
        Arc::new(DefaultPermissionClassifier),
        Arc::new(InMemoryCheckpointStore::new()),
    ))
}

fn diamond_dag() -> Dag {
    Dag::new(vec![
        Task::new("A", "noop:run", TaskKind::McpTool),
        Task::new("B", "noop:run", TaskKind::McpTool).depends_on(["A"]),
        Task::new("C", "noop:run", TaskKind::McpTool).depends_on(["A"]),
        Task::new("D", "noop:run", TaskKind::McpTool).depends_on(["B", "C"]),
    ])
    .unwrap()
}

#[tokio::test]
async fn happy_path_runs_every_layer() {
    let sched = scheduler(ExecutorConfig::default());
    let result = sched.execute(diamond_dag()).await.unwrap();
    assert_eq!(result.total_tasks, 4);
    assert_eq!(result.successful_tasks, 4);
    assert_eq!(result.failed_tasks, 0);
    assert_eq!(result.parallelization_layers, 3);
}

#[tokio::test]
async fn dependency_failure_propagates_without_running_dependent() {
    let dag = Dag::new(vec![
        Task::new("A", "noop:run", TaskKind::McpTool),
        Task::new("B", "fail:tool", TaskKind::McpTool).depends_on(["A"]),
        Task::new("C", "noop:run", TaskKind::McpTool).depends_on(["A"]),
        Task::new("D", "noop:run", TaskKind::McpTool).depends_on(["B", "C"]),
    ])
    .unwrap();

    let sched = scheduler(ExecutorConfig { retry: fast_retry(), ..Default::default() });
    let result = sched.execute(dag).await.unwrap();

    assert_eq!(result.successful_tasks, 2); // A, C
    assert_eq!(result.failed_tasks, 2); // B, D
    assert!(result.errors.get("D").unwrap().contains("dependency"));
}

#[tokio::test]
async fn circular_dependency_halts_before_any_layer_start() {
    let dag = Dag::new(vec![
        Task::new("A", "noop:run", TaskKind::McpTool).depends_on(["B"]),
        Task::new("B", "noop:run", TaskKind::McpTool).depends_on(["A"]),
    ])
    .unwrap();

    let sched = scheduler(ExecutorConfig::default());
    let (stream, _handle) = sched.execute_stream(dag, None);
    tokio::pin!(stream);

    let first = stream.next().await.unwrap().unwrap();
    assert!(matches!(first.kind, ExecutionEventKind::WorkflowStart { .. }));

    let second = stream.next().await.unwrap();
    assert!(second.is_err());
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn checkpoint_resume_skips_completed_layers() {
    let store = Arc::new(InMemoryCheckpointStore::new());
    let sched = Arc::new(Scheduler::new(
        ExecutorConfig::default(),
        Arc::new(EchoTool),
        Arc::new(NoopSandbox),
        Arc::new(NoopCapability),
        Arc::new(NoopPlanner),
        Arc::new(DefaultPermissionClassifier),
        store.clone(),
    ));

    let dag = Dag::new(vec![
        Task::new("A", "noop:run", TaskKind::McpTool),
        Task::new("B", "noop:run", TaskKind::McpTool).depends_on(["A"]),
    ])
    .unwrap();

    let (stream, handle) = sched.clone().execute_stream(dag.clone(), Some("wf-resume".to_string()));
    tokio::pin!(stream);

    let mut first_checkpoint = None;
    while let Some(event) = stream.next().await {
        let event = event.unwrap();
        if let ExecutionEventKind::Checkpoint { checkpoint_id, layer: 0 } = &event.kind {
            first_checkpoint = Some(checkpoint_id.clone());
            break;
        }
    }
    let checkpoint_id = first_checkpoint.expect("layer 0 checkpoint emitted");
    assert_eq!(handle.get_state().tasks.len(), 1);

    let (resumed, resumed_handle) = sched.resume_from_checkpoint(dag, &checkpoint_id).await.unwrap();
    tokio::pin!(resumed);
    while resumed.next().await.is_some() {}

    let state = resumed_handle.get_state();
    assert_eq!(state.tasks.len(), 2);
    assert!(state.tasks.iter().all(|t| t.status == TaskStatus::Success));
}

#[tokio::test]
async fn approved_permission_escalation_retries_the_task() {
    let config = ExecutorConfig {
        hil: HilConfig { enabled: false, approval_required: HilApprovalRequired::Never },
        ..Default::default()
    };
    let sched = Arc::new(Scheduler::new(
        config,
        Arc::new(GuardedOnceTool { calls: AtomicUsize::new(0) }),
        Arc::new(NoopSandbox),
        Arc::new(NoopCapability),
        Arc::new(NoopPlanner),
        Arc::new(DefaultPermissionClassifier),
        Arc::new(InMemoryCheckpointStore::new()),
    ));

    let dag = Dag::new(vec![Task::new("A", "guarded:write", TaskKind::McpTool).side_effecting()]).unwrap();
    let (stream, handle) = sched.execute_stream(dag, None);
    tokio::pin!(stream);

    let mut saw_decision = false;
    while let Some(event) = stream.next().await {
        let event = event.unwrap();
        if let ExecutionEventKind::DecisionRequired { decision } = &event.kind {
            saw_decision = true;
            handle
                .enqueue_command(Command::PermissionEscalationResponse {
                    task_id: decision.task_id.clone().unwrap(),
                    approved: true,
                    elevated_permissions: vec!["read".to_string(), "write".to_string()],
                })
                .unwrap();
        }
        if matches!(event.kind, ExecutionEventKind::WorkflowComplete { .. }) {
            break;
        }
    }

    assert!(saw_decision);
    let state = handle.get_state();
    assert_eq!(state.tasks.len(), 1);
    assert_eq!(state.tasks[0].status, TaskStatus::Success);
}

#[tokio::test]
async fn ail_replan_extends_the_remaining_dag() {
    let config = ExecutorConfig {
        ail: AilConfig { enabled: true, decision_point: AilDecisionPoint::PerLayer },
        ..Default::default()
    };
    let sched = Arc::new(Scheduler::new(
        config,
        Arc::new(EchoTool),
        Arc::new(NoopSandbox),
        Arc::new(NoopCapability),
        Arc::new(ExtendingPlanner),
        Arc::new(DefaultPermissionClassifier),
        Arc::new(InMemoryCheckpointStore::new()),
    ));

    let dag = Dag::new(vec![Task::new("A", "noop:run", TaskKind::McpTool)]).unwrap();
    let (stream, handle) = sched.execute_stream(dag, None);
    tokio::pin!(stream);

    let mut replans_seen = 0;
    while let Some(event) = stream.next().await {
        let event = event.unwrap();
        if let ExecutionEventKind::DecisionRequired { decision } = &event.kind {
            if replans_seen == 0 {
                handle
                    .enqueue_command(Command::ReplanDag { new_requirement: "add a follow-up step".to_string() })
                    .unwrap();
                replans_seen += 1;
            } else {
                handle.enqueue_command(Command::Continue).unwrap();
            }
            let _ = decision;
        }
    }

    let state = handle.get_state();
    assert_eq!(state.tasks.len(), 2);
    assert_eq!(state.replan_count, 1);
    assert!(state.tasks.iter().all(|t| t.status == TaskStatus::Success));
}

#[tokio::test]
async fn transient_failure_retries_and_eventually_succeeds() {
    let config = ExecutorConfig {
        retry: RetryConfig { max_attempts: 3, initial_interval_ms: 1, backoff_factor: 1.0, max_interval_ms: 1, jitter: false },
        ..Default::default()
    };
    let sched = Arc::new(Scheduler::new(
        config,
        Arc::new(FlakyTool { fails_before_success: 2, calls: AtomicUsize::new(0) }),
        Arc::new(NoopSandbox),
        Arc::new(NoopCapability),
        Arc::new(NoopPlanner),
        Arc::new(DefaultPermissionClassifier),
        Arc::new(InMemoryCheckpointStore::new()),
    ));

    let dag = Dag::new(vec![Task::new("A", "flaky:run", TaskKind::McpTool)]).unwrap();
    let result = sched.execute(dag).await.unwrap();

    assert_eq!(result.successful_tasks, 1);
    assert_eq!(result.failed_tasks, 0);
}

#[tokio::test]
async fn transient_failure_gives_up_after_max_attempts() {
    let config = ExecutorConfig { retry: fast_retry(), ..Default::default() };
    let sched = Arc::new(Scheduler::new(
        config,
        Arc::new(FlakyTool { fails_before_success: usize::MAX, calls: AtomicUsize::new(0) }),
        Arc::new(NoopSandbox),
        Arc::new(NoopCapability),
        Arc::new(NoopPlanner),
        Arc::new(DefaultPermissionClassifier),
        Arc::new(InMemoryCheckpointStore::new()),
    ));

    let dag = Dag::new(vec![Task::new("A", "flaky:run", TaskKind::McpTool)]).unwrap();
    let result = sched.execute(dag).await.unwrap();

    assert_eq!(result.successful_tasks, 0);
    assert_eq!(result.failed_tasks, 1);
}

#[tokio::test]
async fn recoverable_failure_produces_failed_safe_and_downstream_still_runs() {
    let sched = Arc::new(Scheduler::new(
        ExecutorConfig { retry: fast_retry(), ..Default::default() },
        Arc::new(RecoverableTool),
        Arc::new(NoopSandbox),
        Arc::new(NoopCapability),
        Arc::new(NoopPlanner),
        Arc::new(DefaultPermissionClassifier),
        Arc::new(InMemoryCheckpointStore::new()),
    ));

    let dag = Dag::new(vec![
        Task::new("A", "best_effort:run", TaskKind::McpTool),
        Task::new("B", "best_effort:run", TaskKind::McpTool).depends_on(["A"]),
    ])
    .unwrap();
    let result = sched.execute(dag).await.unwrap();

    // Both tasks reach a terminal TaskResult (neither is DependencyFailed),
    // even though neither tool call ever succeeds outright.
    assert_eq!(result.total_tasks, 2);
    assert_eq!(result.successful_tasks, 0);
    assert!(!result.errors.values().any(|e| e.contains("dependency")));
}

#[tokio::test]
async fn bounded_concurrency_caps_in_flight_dispatches() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_observed = Arc::new(AtomicUsize::new(0));
    let config = ExecutorConfig { max_concurrency: dagctl_core::Concurrency::Bounded(2), ..Default::default() };
    let sched = Arc::new(Scheduler::new(
        config,
        Arc::new(ConcurrencyTrackingTool { in_flight: in_flight.clone(), max_observed: max_observed.clone() }),
        Arc::new(NoopSandbox),
        Arc::new(NoopCapability),
        Arc::new(NoopPlanner),
        Arc::new(DefaultPermissionClassifier),
        Arc::new(InMemoryCheckpointStore::new()),
    ));

    let dag = Dag::new(
        (0..8).map(|i| Task::new(format!("t{i}"), "track:run", TaskKind::McpTool)).collect(),
    )
    .unwrap();
    sched.execute(dag).await.unwrap();

    assert!(max_observed.load(Ordering::SeqCst) <= 2, "observed {} concurrent dispatches, expected at most 2", max_observed.load(Ordering::SeqCst));
}
