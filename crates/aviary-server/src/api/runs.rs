//! Workflow run endpoint.
//!
//! Run-level failures are translated into server errors with a summarized
//! message; the execution summary is preserved in the body for diagnostics,
//! and no internal traces ever reach the response.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use aviary_core::error::{ServerError, WorkflowError};
use aviary_core::state::AppState;
use aviary_core::workflow::ExecutionContext;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/{owner}/{agent_id}/workflows/{workflow_id}/run",
        post(run_workflow),
    )
}

#[derive(Debug, Default, Deserialize)]
struct RunRequest {
    #[serde(default)]
    context: ExecutionContext,
}

async fn run_workflow(
    State(state): State<AppState>,
    Path((owner, agent_id, workflow_id)): Path<(String, String, String)>,
    body: Option<Json<RunRequest>>,
) -> Result<Response, ServerError> {
    let agent = state
        .agent_store
        .get(&owner, &agent_id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("Agent {} not found", agent_id)))?;

    let request = body.map(|Json(r)| r).unwrap_or_default();
    let mut executor = state.executor_for(agent);

    match executor.run(&workflow_id, request.context).await {
        Ok(context) => Ok(Json(serde_json::json!({
            "success": true,
            "context": context,
            "summary": executor.execution_summary(),
        }))
        .into_response()),
        Err(err) => {
            tracing::error!("Workflow '{}' run failed: {}", workflow_id, err);
            let status = match &err {
                WorkflowError::WorkflowNotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            let body = serde_json::json!({
                "success": false,
                "error": err.to_string(),
                "summary": executor.execution_summary(),
            });
            Ok((status, Json(body)).into_response())
        }
    }
}
