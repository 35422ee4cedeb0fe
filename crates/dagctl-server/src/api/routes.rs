//! Route table for the minimal executor control surface, grounded in
//! `orchestrator::api::routes::create_router`'s
//! `Router::new().route(...).with_state(app_state)` shape.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::state::AppState;
use crate::api::{handlers, ws};

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/workflows", post(handlers::execute_workflow))
        .route("/workflows/:id/events", get(ws::workflow_events))
        .route("/workflows/:id/commands", post(handlers::enqueue_command))
        .route("/workflows/:id/state", get(handlers::get_workflow_state))
        .route("/workflows/:id/resume", post(handlers::resume_workflow))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executors::{DecliningPlanner, EchoToolExecutor, NoopCapabilityExecutor, NoopSandboxRunner};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use dagctl_checkpoint::InMemoryCheckpointStore;
    use dagctl_core::{DefaultPermissionClassifier, ExecutorConfig, Scheduler};
    use dagctl_graphrag::{Graph, GraphRagStore, Hypergraph, ShgatParams};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn test_app_state() -> AppState {
        let checkpoint_store: Arc<dyn dagctl_checkpoint::CheckpointStore> = Arc::new(InMemoryCheckpointStore::new());
        let scheduler = Arc::new(Scheduler::new(
            ExecutorConfig::default(),
            Arc::new(EchoToolExecutor),
            Arc::new(NoopSandboxRunner),
            Arc::new(NoopCapabilityExecutor),
            Arc::new(DecliningPlanner),
            Arc::new(DefaultPermissionClassifier),
            checkpoint_store.clone(),
        ));
        let db: Arc<dyn crate::db::DbClient> = Arc::new(crate::db::SqliteDbClient::connect("sqlite::memory:").await.unwrap());
        let graphrag = Arc::new(GraphRagStore::new(Graph::new(), Hypergraph::new(), ShgatParams::new(8, 2, 4, 2)));
        AppState {
            config: Arc::new(crate::config::Config::default()),
            scheduler,
            checkpoint_store,
            db,
            graphrag,
            running: Arc::new(dashmap::DashMap::new()),
        }
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let app = create_router(test_app_state().await);
        let response = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn executing_an_empty_dag_is_accepted() {
        let app = create_router(test_app_state().await);
        let body = serde_json::json!({"dag": {"tasks": []}}).to_string();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/workflows")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
}
