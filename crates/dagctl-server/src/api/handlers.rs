//! Executor API handlers: execute, enqueue a command, read state,
//! resume from checkpoint. Grounded in
//! `orchestrator::api::handlers::workflows`'s handler shape
//! (`State<AppState>` + `Json<Request>` -> `ApiResult<impl IntoResponse>`),
//! narrowed to this system's five-endpoint surface.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use futures::StreamExt;
use tokio::sync::broadcast;

use dagctl_core::{Command, ExecutionEvent, WorkflowState};

use crate::api::models::{ExecuteWorkflowRequest, ExecuteWorkflowResponse, ResumeWorkflowRequest};
use crate::api::state::{AppState, RunningWorkflow};
use crate::db::models::WorkflowExecutionRecord;
use crate::error::{Result, ServerError};
use crate::learning;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}

/// `POST /workflows`. Starts the DAG running in the background and
/// returns immediately with the workflow id; progress is observed via
/// the WS event stream or by polling `GET /workflows/:id/state`.
pub async fn execute_workflow(
    State(app_state): State<AppState>,
    Json(req): Json<ExecuteWorkflowRequest>,
) -> Result<impl IntoResponse> {
    let (stream, handle) = app_state.scheduler.clone().execute_stream(req.dag.clone(), req.workflow_id.clone());
    let workflow_id = handle.get_state().workflow_id;

    let (events_tx, _) = broadcast::channel(256);
    app_state.running.insert(
        workflow_id.clone(),
        RunningWorkflow { handle: handle.clone(), events: events_tx.clone(), dag: req.dag.clone() },
    );

    spawn_run_to_completion(app_state, workflow_id.clone(), req.intent_text, req.dag, stream, events_tx);

    Ok((StatusCode::ACCEPTED, Json(ExecuteWorkflowResponse { workflow_id })))
}

/// `POST /workflows/:id/resume`. Same background-task shape as
/// `execute_workflow`, seeded from a checkpoint instead of a fresh DAG.
pub async fn resume_workflow(
    State(app_state): State<AppState>,
    Json(req): Json<ResumeWorkflowRequest>,
) -> Result<impl IntoResponse> {
    let (stream, handle) = app_state
        .scheduler
        .clone()
        .resume_from_checkpoint(req.dag.clone(), &req.checkpoint_id)
        .await?;
    let workflow_id = handle.get_state().workflow_id;

    let (events_tx, _) = broadcast::channel(256);
    app_state.running.insert(
        workflow_id.clone(),
        RunningWorkflow { handle: handle.clone(), events: events_tx.clone(), dag: req.dag.clone() },
    );

    spawn_run_to_completion(app_state, workflow_id.clone(), String::new(), req.dag, stream, events_tx);

    Ok((StatusCode::ACCEPTED, Json(ExecuteWorkflowResponse { workflow_id })))
}

/// `POST /workflows/:id/commands`.
pub async fn enqueue_command(
    State(app_state): State<AppState>,
    Path(workflow_id): Path<String>,
    Json(command): Json<Command>,
) -> Result<impl IntoResponse> {
    let running = app_state.running.get(&workflow_id).ok_or_else(|| ServerError::WorkflowNotFound(workflow_id.clone()))?;
    running.handle.enqueue_command(command)?;
    Ok(StatusCode::ACCEPTED)
}

/// `GET /workflows/:id/state`. Falls back to the latest persisted
/// checkpoint once the workflow has left the in-memory running table.
pub async fn get_workflow_state(
    State(app_state): State<AppState>,
    Path(workflow_id): Path<String>,
) -> Result<Json<WorkflowState>> {
    if let Some(running) = app_state.running.get(&workflow_id) {
        return Ok(Json(running.handle.get_state()));
    }
    let checkpoint = app_state
        .checkpoint_store
        .latest(&workflow_id)
        .await?
        .ok_or_else(|| ServerError::WorkflowNotFound(workflow_id.clone()))?;
    let state: WorkflowState = serde_json::from_value(checkpoint.state)?;
    Ok(Json(state))
}

fn spawn_run_to_completion(
    app_state: AppState,
    workflow_id: String,
    intent_text: String,
    dag: dagctl_core::Dag,
    stream: impl futures::Stream<Item = dagctl_core::Result<ExecutionEvent>> + Send + 'static,
    events_tx: broadcast::Sender<ExecutionEvent>,
) {
    tokio::spawn(async move {
        tokio::pin!(stream);
        let start = Instant::now();
        let mut error_message = None;

        while let Some(event) = stream.next().await {
            match event {
                Ok(event) => {
                    let _ = events_tx.send(event);
                }
                Err(e) => {
                    tracing::warn!(workflow_id = %workflow_id, error = %e, "workflow stream ended with an error");
                    error_message = Some(e.to_string());
                    break;
                }
            }
        }

        let final_state = app_state.running.get(&workflow_id).map(|r| r.handle.get_state());
        if let Some(state) = final_state {
            let success = error_message.is_none() && state.tasks.iter().all(|t| t.status != dagctl_core::TaskStatus::Error);
            let record = WorkflowExecutionRecord {
                id: workflow_id.clone(),
                intent_text,
                dag_json: serde_json::to_value(&dag).unwrap_or(serde_json::Value::Null),
                success,
                execution_time_ms: start.elapsed().as_millis() as i64,
                error_message,
                user_id: app_state.config.user_id.clone(),
                executed_at: chrono::Utc::now().timestamp_millis(),
            };
            if let Err(e) = app_state.db.record_workflow_execution(&record).await {
                tracing::warn!(workflow_id = %workflow_id, error = %e, "failed to persist workflow_execution row");
            }
            if let Err(e) = learning::record_completed_workflow(&app_state.graphrag, app_state.db.as_ref(), &dag, &state).await {
                tracing::warn!(workflow_id = %workflow_id, error = %e, "failed to feed completed workflow into the learning core");
            }
        }
    });
}
