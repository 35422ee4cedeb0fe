//! Request/response DTOs for the control surface, grounded in
//! `orchestrator::api::models`'s plain-struct-plus-`validate` style.

use serde::{Deserialize, Serialize};

use dagctl_core::Dag;

#[derive(Debug, Deserialize)]
pub struct ExecuteWorkflowRequest {
    pub dag: Dag,
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub intent_text: String,
}

#[derive(Debug, Serialize)]
pub struct ExecuteWorkflowResponse {
    pub workflow_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ResumeWorkflowRequest {
    pub dag: Dag,
    pub checkpoint_id: String,
}

