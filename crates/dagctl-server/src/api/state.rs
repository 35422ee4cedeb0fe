//! Shared application state threaded through every handler via axum's
//! `State` extractor, grounded in `orchestrator::api::routes::AppState`
//! (there: `{db, broadcast}`; here the executor, its checkpoint store
//! and the GraphRAG store join the same bag).

use std::sync::Arc;

use dagctl_checkpoint::CheckpointStore;
use dagctl_core::{ExecutionEvent, Scheduler};
use dagctl_graphrag::GraphRagStore;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::db::DbClient;

/// One in-flight or completed workflow's server-side bookkeeping: the
/// `RunHandle` for enqueuing commands / reading state, and a broadcast
/// channel new WS subscribers can join mid-stream (late joiners miss
/// earlier events, matching a typical broadcast-channel contract; the
/// full history is always recoverable via `GET /workflows/:id/state`).
pub struct RunningWorkflow {
    pub handle: dagctl_core::RunHandle,
    pub events: broadcast::Sender<ExecutionEvent>,
    pub dag: dagctl_core::Dag,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub scheduler: Arc<Scheduler>,
    pub checkpoint_store: Arc<dyn CheckpointStore>,
    pub db: Arc<dyn DbClient>,
    pub graphrag: Arc<GraphRagStore>,
    pub running: Arc<DashMap<String, RunningWorkflow>>,
}
