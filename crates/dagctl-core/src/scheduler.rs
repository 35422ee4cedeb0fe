//! The Scheduler (C1) and the two decision gates it drives (C4).
//!
//! Execution is modeled as an explicit phase state machine:
//! `AwaitingStart -> RunningLayer(k) -> AwaitingAIL(k) ->
//! AwaitingHIL(k) -> Finalizing -> Done`, with
//! `AwaitingEscalations(k)` inserted between `RunningLayer` and the
//! decision gates whenever a task in the layer raised a permission
//! denial. The state machine is expressed as an `async_stream::stream!`
//! generator (the closest stable-Rust analogue to a lazily-pulled
//! interface) that yields `Result<ExecutionEvent, ExecutorError>` and
//! leaves the terminal [`WorkflowState`] in a [`RunHandle`] the caller
//! already holds.

use async_stream::stream;
use chrono::Utc;
use futures::stream::{FuturesOrdered, Stream, StreamExt};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

use dagctl_checkpoint::{Checkpoint, CheckpointStore};

use crate::argument::ArgumentResolver;
use crate::command::{Command, CommandQueue, CommandSender};
use crate::config::ExecutorConfig;
use crate::decision::{ail_should_trigger, hil_should_trigger};
use crate::error::{ExecutorError, Result, TaskFailure};
use crate::event::{DecisionContext, DecisionKind, ExecutionEvent, ExecutionEventKind};
use crate::executor_trait::{CapabilityExecutor, PermissionClassifier, Planner, SandboxRunner, ToolExecutor};
use crate::ratelimit::KeyedRateLimiter;
use crate::result::{DagExecutionResult, TaskResult, TaskStatus};
use crate::state::{StateUpdate, WorkflowState};
use crate::task::{Dag, Task, TaskKind};

/// A running workflow's externally-visible handle: the shared state
/// (readable via `get_state`/mutable via `update_state`) and a producer
/// for the command queue the scheduler drains.
#[derive(Clone)]
pub struct RunHandle {
    state: Arc<RwLock<WorkflowState>>,
    commands: CommandSender,
}

impl RunHandle {
    pub fn get_state(&self) -> WorkflowState {
        self.state.read().clone()
    }

    pub fn update_state(&self, update: StateUpdate) {
        self.state.write().apply(update);
    }

    pub fn enqueue_command(&self, command: Command) -> Result<()> {
        self.commands.enqueue(command)
    }
}

enum DispatchOutcome {
    Result(TaskResult),
    Escalation { task_id: String, current: Vec<String>, requested: Vec<String>, operation: String, alternative: Option<String> },
}

pub struct Scheduler {
    config: ExecutorConfig,
    tool_executor: Arc<dyn ToolExecutor>,
    sandbox: Arc<dyn SandboxRunner>,
    capability_executor: Arc<dyn CapabilityExecutor>,
    planner: Arc<dyn Planner>,
    classifier: Arc<dyn PermissionClassifier>,
    rate_limiter: KeyedRateLimiter,
    checkpoint_store: Arc<dyn CheckpointStore>,
    concurrency_limiter: Option<Arc<Semaphore>>,
}

impl Scheduler {
    pub fn new(
        config: ExecutorConfig,
        tool_executor: Arc<dyn ToolExecutor>,
        sandbox: Arc<dyn SandboxRunner>,
        capability_executor: Arc<dyn CapabilityExecutor>,
        planner: Arc<dyn Planner>,
        classifier: Arc<dyn PermissionClassifier>,
        checkpoint_store: Arc<dyn CheckpointStore>,
    ) -> Self {
        let rate_limiter = KeyedRateLimiter::new(
            config.rate_limit_default_capacity,
            std::time::Duration::from_millis(config.rate_limit_default_period_ms),
        );
        let concurrency_limiter = config.concurrency_limit().map(|n| Arc::new(Semaphore::new(n)));
        Self {
            config,
            tool_executor,
            sandbox,
            capability_executor,
            planner,
            classifier,
            rate_limiter,
            checkpoint_store,
            concurrency_limiter,
        }
    }

    /// Interactive entry point. Returns immediately with a
    /// lazily-pulled event stream and a [`RunHandle`]; the terminal
    /// `WorkflowState` is read from the handle once the stream ends.
    pub fn execute_stream(
        self: Arc<Self>,
        dag: Dag,
        workflow_id: Option<String>,
    ) -> (impl Stream<Item = Result<ExecutionEvent>>, RunHandle) {
        let workflow_id = workflow_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let state = Arc::new(RwLock::new(WorkflowState::new(workflow_id.clone())));
        let queue = CommandQueue::new();
        let commands = queue.handle();
        let handle = RunHandle { state: state.clone(), commands: commands.clone() };

        let stream = self.run(dag, workflow_id, state, queue, 0);
        (stream, handle)
    }

    /// Restores state from `checkpoint_id`, re-topo-sorts the DAG, skips
    /// the layers the checkpoint already covers, and continues. Decision
    /// gates run on the resumed layers exactly as on a fresh run — no
    /// bypass for resumed work.
    pub async fn resume_from_checkpoint(
        self: Arc<Self>,
        dag: Dag,
        checkpoint_id: &str,
    ) -> Result<(impl Stream<Item = Result<ExecutionEvent>>, RunHandle)> {
        let checkpoint = self
            .checkpoint_store
            .get(checkpoint_id)
            .await
            .map_err(|e| ExecutorError::CheckpointNotFound(e.to_string()))?
            .ok_or_else(|| ExecutorError::CheckpointNotFound(checkpoint_id.to_string()))?;

        let restored: WorkflowState = serde_json::from_value(checkpoint.state.clone())
            .map_err(|e| ExecutorError::DagMismatch(format!("corrupt checkpoint state: {e}")))?;

        let total_layers = dag.layers()?.len();
        let completed_count = (checkpoint.layer + 1).min(total_layers);

        let workflow_id = restored.workflow_id.clone();
        let state = Arc::new(RwLock::new(restored));
        let queue = CommandQueue::new();
        let commands = queue.handle();
        let handle = RunHandle { state: state.clone(), commands: commands.clone() };

        let stream = self.run(dag, workflow_id, state, queue, completed_count);
        Ok((stream, handle))
    }

    /// Non-interactive convenience entry point. Drives `execute_stream`
    /// to completion; if a `decision_required` event appears (meaning
    /// the configuration demands an interactive response this caller
    /// can't give), the run is abandoned and the returned result
    /// describes the approval that was needed instead of blocking
    /// forever.
    pub async fn execute(self: Arc<Self>, dag: Dag) -> Result<DagExecutionResult> {
        let (stream, handle) = self.clone().execute_stream(dag, None);
        tokio::pin!(stream);

        let mut approval_needed = None;
        while let Some(event) = stream.next().await {
            let event = event?;
            if let ExecutionEventKind::DecisionRequired { decision } = &event.kind {
                approval_needed = Some(format!(
                    "{:?} decision required at layer {}: {}",
                    decision.kind, decision.layer, decision.reason
                ));
                break;
            }
        }

        let state = handle.get_state();
        let mut result = self.summarize(&state, &handle);
        if let Some(reason) = approval_needed {
            result.errors.insert("approval_required".to_string(), reason);
        }
        Ok(result)
    }

    fn summarize(&self, state: &WorkflowState, _handle: &RunHandle) -> DagExecutionResult {
        let successful_tasks = state.tasks.iter().filter(|t| t.status == TaskStatus::Success).count();
        let failed_tasks = state.tasks.iter().filter(|t| t.status == TaskStatus::Error).count();
        let mut errors = HashMap::new();
        for t in state.tasks.iter().filter(|t| t.status == TaskStatus::Error) {
            if let Some(e) = &t.error {
                errors.insert(t.task_id.clone(), e.clone());
            }
        }

        // Approximate speedup: sum of per-task durations against the sum
        // of the slowest task per layer, since that slowest task bounds
        // how long a settle-all of that layer actually took.
        let mut by_layer: HashMap<usize, u64> = HashMap::new();
        let mut sequential_ms = 0u64;
        for t in &state.tasks {
            if let Some(ms) = t.execution_time_ms {
                sequential_ms += ms;
                if let Some(layer) = t.layer_index {
                    let slot = by_layer.entry(layer).or_insert(0);
                    *slot = (*slot).max(ms);
                }
            }
        }
        let parallel_ms: u64 = by_layer.values().sum();
        let speedup = if parallel_ms == 0 { 1.0 } else { sequential_ms as f64 / parallel_ms as f64 };

        DagExecutionResult {
            workflow_id: state.workflow_id.clone(),
            total_tasks: state.tasks.len(),
            successful_tasks,
            failed_tasks,
            parallelization_layers: state.current_layer,
            speedup,
            errors,
            replan_count: state.replan_count,
            replan_noop_count: state.replan_noop_count,
        }
    }

    /// The core generator. `skip_layers` supports resume: that many
    /// leading layers of `dag` are treated as already complete and
    /// neither dispatched nor re-emitted.
    fn run(
        self: Arc<Self>,
        dag: Dag,
        workflow_id: String,
        state: Arc<RwLock<WorkflowState>>,
        mut queue: CommandQueue,
        skip_layers: usize,
    ) -> impl Stream<Item = Result<ExecutionEvent>> {
        let sequence = Arc::new(AtomicU64::new(0));
        stream! {
            let emit = |kind: ExecutionEventKind, sequence: &AtomicU64| ExecutionEvent {
                workflow_id: workflow_id.clone(),
                timestamp: Utc::now().timestamp_millis(),
                sequence: sequence.fetch_add(1, Ordering::SeqCst),
                kind,
            };

            yield Ok(emit(ExecutionEventKind::WorkflowStart { total_layers: None }, &sequence));

            let mut layers: VecDeque<Vec<String>> = match dag.layers() {
                Ok(layers) => layers.into(),
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            let mut tasks_by_id: HashMap<String, Task> = dag.tasks.iter().map(|t| (t.id.clone(), t.clone())).collect();

            for _ in 0..skip_layers.min(layers.len()) {
                layers.pop_front();
            }

            let mut global_layer: usize = skip_layers;

            while let Some(raw_layer) = layers.pop_front() {
                // Pre-layer drain point: abort/pause.
                for cmd in queue.drain() {
                    if let Command::Abort { reason } = cmd {
                        yield Ok(emit(ExecutionEventKind::WorkflowAbort { reason: reason.clone() }, &sequence));
                        return;
                    }
                }

                let layer_tasks: Vec<String> = {
                    let s = state.read();
                    raw_layer.into_iter().filter(|id| s.result_for(id).is_none()).collect()
                };
                if layer_tasks.is_empty() {
                    continue;
                }

                let layer_index = global_layer;
                global_layer += 1;

                yield Ok(emit(
                    ExecutionEventKind::LayerStart { layer: layer_index, task_ids: layer_tasks.clone() },
                    &sequence,
                ));

                for id in &layer_tasks {
                    yield Ok(emit(ExecutionEventKind::TaskStart { task_id: id.clone(), layer: layer_index }, &sequence));
                }

                let results_so_far = { state.read().results_by_id() };
                let mut futures = FuturesOrdered::new();
                for id in &layer_tasks {
                    let task = tasks_by_id.get(id).cloned().expect("task present in its own layer");
                    let this = self.clone();
                    let results = results_so_far.clone();
                    let limiter = this.concurrency_limiter.clone();
                    futures.push_back(async move {
                        let _permit = match &limiter {
                            Some(sem) => Some(sem.clone().acquire_owned().await.expect("semaphore never closed")),
                            None => None,
                        };
                        this.dispatch_task(&task, &results, layer_index).await
                    });
                }

                let mut outcomes = Vec::with_capacity(layer_tasks.len());
                while let Some(outcome) = futures.next().await {
                    outcomes.push(outcome);
                }

                let mut settled = Vec::new();
                let mut pending_escalations = Vec::new();
                for outcome in outcomes {
                    match outcome {
                        DispatchOutcome::Result(result) => settled.push(result),
                        DispatchOutcome::Escalation { task_id, current, requested, operation, alternative } => {
                            pending_escalations.push((task_id, current, requested, operation, alternative));
                        }
                    }
                }

                for result in &settled {
                    let event_kind = match result.status {
                        TaskStatus::Success => ExecutionEventKind::TaskComplete {
                            task_id: result.task_id.clone(),
                            layer: layer_index,
                            execution_time_ms: result.execution_time_ms.unwrap_or(0),
                        },
                        TaskStatus::Error => ExecutionEventKind::TaskError {
                            task_id: result.task_id.clone(),
                            layer: Some(layer_index),
                            error: result.error.clone().unwrap_or_default(),
                        },
                        TaskStatus::FailedSafe => ExecutionEventKind::TaskWarning {
                            task_id: result.task_id.clone(),
                            message: "failed_safe".to_string(),
                        },
                    };
                    yield Ok(emit(event_kind, &sequence));
                }

                // Deferred permission escalation: every decision_required
                // is flushed to observers before any is awaited.
                if !pending_escalations.is_empty() {
                    for (task_id, current, requested, operation, alternative) in &pending_escalations {
                        yield Ok(emit(
                            ExecutionEventKind::DecisionRequired {
                                decision: DecisionContext {
                                    kind: DecisionKind::Hil,
                                    layer: layer_index,
                                    task_id: Some(task_id.clone()),
                                    current_permissions: Some(current.clone()),
                                    requested_permissions: Some(requested.clone()),
                                    detected_operation: Some(operation.clone()),
                                    suggested_alternative: alternative.clone(),
                                    reason: format!("task {task_id} requires elevated permissions for {operation}"),
                                },
                            },
                            &sequence,
                        ));
                    }

                    for (task_id, _current, requested, _operation, _alternative) in pending_escalations {
                        let response = queue.recv_timeout(self.config.hil_timeout()).await;
                        let (approved, elevated) = match response {
                            Some(Command::PermissionEscalationResponse { task_id: id, approved, elevated_permissions }) if id == task_id => {
                                (approved, elevated_permissions)
                            }
                            Some(Command::ApprovalResponse { approved, .. }) => (approved, requested.clone()),
                            _ => (false, Vec::new()),
                        };

                        let result = if approved {
                            let task = tasks_by_id.get(&task_id).cloned().unwrap();
                            let results = { state.read().results_by_id() };
                            match self.dispatch_task_elevated(&task, &results, layer_index, &elevated).await {
                                DispatchOutcome::Result(r) => r,
                                DispatchOutcome::Escalation { .. } => {
                                    TaskResult::error(task_id.clone(), "permission escalation re-execution still denied", layer_index)
                                }
                            }
                        } else {
                            TaskResult::error(task_id.clone(), "permission escalation rejected or timed out", layer_index)
                        };

                        let event_kind = match result.status {
                            TaskStatus::Success => ExecutionEventKind::TaskComplete {
                                task_id: result.task_id.clone(),
                                layer: layer_index,
                                execution_time_ms: result.execution_time_ms.unwrap_or(0),
                            },
                            _ => ExecutionEventKind::TaskError {
                                task_id: result.task_id.clone(),
                                layer: Some(layer_index),
                                error: result.error.clone().unwrap_or_default(),
                            },
                        };
                        yield Ok(emit(event_kind, &sequence));
                        settled.push(result);
                    }
                }

                let layer_had_error = settled.iter().any(|r| r.status == TaskStatus::Error);
                let layer_has_side_effects = layer_tasks.iter().any(|id| tasks_by_id.get(id).map(|t| t.has_side_effects).unwrap_or(false));

                let summary = {
                    let mut s = state.write();
                    s.current_layer = layer_index;
                    s.apply(StateUpdate { new_tasks: settled, ..Default::default() })
                };
                yield Ok(emit(summary.into(), &sequence));

                // Checkpoint (best-effort, non-fatal).
                let snapshot = { state.read().clone() };
                let checkpoint_id = match serde_json::to_value(&snapshot) {
                    Ok(value) => {
                        let checkpoint = Checkpoint::new(workflow_id.clone(), layer_index, value, Utc::now().timestamp_millis());
                        let id = checkpoint.id.clone();
                        match self.checkpoint_store.put(checkpoint, self.config.checkpoint_retention).await {
                            Ok(()) => id,
                            Err(e) => {
                                tracing::warn!(error = %e, "checkpoint persistence failed");
                                format!("failed-{id}")
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "checkpoint serialization failed");
                        format!("failed-{}", uuid::Uuid::new_v4())
                    }
                };
                yield Ok(emit(ExecutionEventKind::Checkpoint { checkpoint_id, layer: layer_index }, &sequence));

                // AIL gate.
                if self.config.ail.enabled && ail_should_trigger(self.config.ail.decision_point, layer_had_error) {
                    yield Ok(emit(
                        ExecutionEventKind::DecisionRequired {
                            decision: DecisionContext {
                                kind: DecisionKind::Ail,
                                layer: layer_index,
                                task_id: None,
                                current_permissions: None,
                                requested_permissions: None,
                                detected_operation: None,
                                suggested_alternative: None,
                                reason: "agent-in-the-loop checkpoint".to_string(),
                            },
                        },
                        &sequence,
                    ));

                    match queue.recv_timeout(self.config.ail_timeout()).await {
                        Some(Command::Abort { reason }) => {
                            yield Ok(emit(ExecutionEventKind::WorkflowAbort { reason: reason.clone() }, &sequence));
                            return;
                        }
                        Some(Command::ReplanDag { new_requirement }) => {
                            let completed_tasks: Vec<String> = { state.read().tasks.iter().map(|t| t.task_id.clone()).collect() };
                            let context = { state.read().context.clone() };
                            let replans_so_far = { state.read().replan_count };
                            match self.planner.replan(&completed_tasks, &new_requirement, &context).await {
                                Ok(new_dag) => {
                                    let remaining_before: usize = layers.iter().map(|l| l.len()).sum();
                                    if new_dag.tasks.len() == remaining_before {
                                        let summary = {
                                            let mut s = state.write();
                                            s.apply(StateUpdate {
                                                note: Some("replan_noop".to_string()),
                                                replan_noop: true,
                                                ..Default::default()
                                            })
                                        };
                                        yield Ok(emit(summary.into(), &sequence));
                                    } else if replans_so_far < self.config.max_replans {
                                        for t in &new_dag.tasks {
                                            tasks_by_id.insert(t.id.clone(), t.clone());
                                        }
                                        match new_dag.layers() {
                                            Ok(new_layers) => {
                                                layers = new_layers.into();
                                                let summary = {
                                                    let mut s = state.write();
                                                    s.apply(StateUpdate { replan: true, ..Default::default() })
                                                };
                                                yield Ok(emit(summary.into(), &sequence));
                                            }
                                            Err(e) => {
                                                yield Err(e);
                                                return;
                                            }
                                        }
                                    }
                                }
                                Err(e) => {
                                    tracing::warn!(error = %e, "replan failed, continuing with existing dag");
                                }
                            }
                        }
                        _ => {} // Continue or timeout: proceed.
                    }
                }

                // HIL gate.
                if self.config.hil.enabled && hil_should_trigger(self.config.hil.approval_required, layer_has_side_effects) {
                    yield Ok(emit(
                        ExecutionEventKind::DecisionRequired {
                            decision: DecisionContext {
                                kind: DecisionKind::Hil,
                                layer: layer_index,
                                task_id: None,
                                current_permissions: None,
                                requested_permissions: None,
                                detected_operation: None,
                                suggested_alternative: None,
                                reason: "human approval required before continuing".to_string(),
                            },
                        },
                        &sequence,
                    ));

                    match queue.recv_timeout(self.config.hil_timeout()).await {
                        Some(Command::ApprovalResponse { approved: true, .. }) => {}
                        Some(Command::ApprovalResponse { approved: false, feedback }) => {
                            let reason = feedback.unwrap_or_else(|| "rejected by reviewer".to_string());
                            yield Ok(emit(ExecutionEventKind::WorkflowAbort { reason: reason.clone() }, &sequence));
                            return;
                        }
                        None => {
                            yield Ok(emit(ExecutionEventKind::WorkflowAbort { reason: "HIL decision timed out".to_string() }, &sequence));
                            return;
                        }
                        _ => {
                            yield Ok(emit(ExecutionEventKind::WorkflowAbort { reason: "unexpected command at HIL gate".to_string() }, &sequence));
                            return;
                        }
                    }
                }

            }

            let final_state = state.read().clone();
            let successful = final_state.tasks.iter().filter(|t| t.status == TaskStatus::Success).count();
            let failed = final_state.tasks.iter().filter(|t| t.status == TaskStatus::Error).count();

            yield Ok(emit(
                ExecutionEventKind::WorkflowComplete { successful_tasks: successful, failed_tasks: failed },
                &sequence,
            ));
        }
    }

    async fn dispatch_task(&self, task: &Task, results: &HashMap<String, TaskResult>, layer: usize) -> DispatchOutcome {
        self.dispatch_task_inner(task, results, layer, None).await
    }

    async fn dispatch_task_elevated(
        &self,
        task: &Task,
        results: &HashMap<String, TaskResult>,
        layer: usize,
        elevated: &[String],
    ) -> DispatchOutcome {
        self.dispatch_task_inner(task, results, layer, Some(elevated)).await
    }

    async fn dispatch_task_inner(
        &self,
        task: &Task,
        results: &HashMap<String, TaskResult>,
        layer: usize,
        elevated_permissions: Option<&[String]>,
    ) -> DispatchOutcome {
        for dep in &task.depends_on {
            match results.get(dep).map(|r| r.status) {
                Some(TaskStatus::Error) => {
                    return DispatchOutcome::Result(TaskResult::error(
                        task.id.clone(),
                        format!("dependency {dep} failed"),
                        layer,
                    ));
                }
                Some(_) | None => {}
            }
        }

        let resolver = ArgumentResolver::new(results);
        let (args, _warnings) = match resolver.resolve_all(&task.arguments) {
            Ok(v) => v,
            Err(failure) => {
                return DispatchOutcome::Result(TaskResult::error(task.id.clone(), failure.to_string(), layer));
            }
        };

        self.rate_limiter.acquire(&task.tool).await;

        let start = Instant::now();
        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let dispatch = async {
                match task.kind {
                    TaskKind::McpTool => self.tool_executor.call(&task.tool, args.clone()).await,
                    TaskKind::CodeExecution => {
                        let code = args.get("code").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                        self.sandbox.run(&code, args.clone(), results_as_values(results), task.sandbox.as_ref()).await
                    }
                    TaskKind::Capability => self.capability_executor.invoke(&task.tool, args.clone()).await,
                }
            };

            match tokio::time::timeout(self.config.task_timeout(), dispatch).await {
                Ok(Ok(output)) => {
                    let ms = start.elapsed().as_millis() as u64;
                    return DispatchOutcome::Result(TaskResult::success(task.id.clone(), output, ms, layer));
                }
                Ok(Err(failure)) => {
                    if let TaskFailure::Recoverable(_) = &failure {
                        return DispatchOutcome::Result(TaskResult::failed_safe(task.id.clone(), None, layer));
                    }

                    if elevated_permissions.is_none() {
                        if let Some(escalation) = self.classifier.classify(&failure) {
                            return DispatchOutcome::Escalation {
                                task_id: task.id.clone(),
                                current: escalation.current,
                                requested: escalation.requested,
                                operation: escalation.detected_operation,
                                alternative: escalation.suggested_alternative,
                            };
                        }
                    }

                    if is_transient(&failure) && attempt < max_attempts {
                        tokio::time::sleep(self.config.retry.delay_for(attempt + 1)).await;
                        continue;
                    }
                    return DispatchOutcome::Result(TaskResult::error(task.id.clone(), failure.to_string(), layer));
                }
                Err(_) => {
                    if attempt < max_attempts {
                        tokio::time::sleep(self.config.retry.delay_for(attempt + 1)).await;
                        continue;
                    }
                    return DispatchOutcome::Result(TaskResult::error(
                        task.id.clone(),
                        TaskFailure::Timeout(self.config.task_timeout_ms).to_string(),
                        layer,
                    ));
                }
            }
        }
    }
}

/// Transient dispatch failures are retried; anything that reflects a
/// structural property of the DAG or the caller's permission set is
/// not, since retrying it would only reproduce the same failure.
fn is_transient(failure: &TaskFailure) -> bool {
    matches!(failure, TaskFailure::Timeout(_) | TaskFailure::ToolError(_))
}

fn results_as_values(results: &HashMap<String, TaskResult>) -> HashMap<String, serde_json::Value> {
    results
        .iter()
        .map(|(id, r)| (id.clone(), r.output.clone().unwrap_or(serde_json::Value::Null)))
        .collect()
}
