//! Error taxonomy for the ambient server surface, kept separate from
//! `dagctl_core::ExecutorError` so a config/db/transport failure never
//! needs to masquerade as an execution failure. Named `ServerError`
//! after `orchestrator::OrchestratorError`'s role as the crate-wide
//! catch-all.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] dagctl_checkpoint::CheckpointError),

    #[error("execution error: {0}")]
    Execution(#[from] dagctl_core::ExecutorError),

    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::WorkflowNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Database(_) | ServerError::Checkpoint(_) | ServerError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServerError::Execution(_) => StatusCode::CONFLICT,
        };
        let body = ErrorBody { error: format!("{:?}", status), message: self.to_string() };
        (status, Json(body)).into_response()
    }
}
