use axum::{
    extract::{Path, Query, State},
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;

use aviary_core::error::ServerError;
use aviary_core::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_schedules))
        .route("/{id}", delete(delete_schedule))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    agent_id: Option<String>,
    owner: Option<String>,
}

async fn list_schedules(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let tasks = state
        .schedule_store
        .list(q.agent_id.as_deref(), q.owner.as_deref())
        .await?;
    Ok(Json(serde_json::json!({ "tasks": tasks })))
}

#[derive(Debug, Deserialize)]
struct DeleteQuery {
    owner: String,
}

async fn delete_schedule(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<DeleteQuery>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let deleted = state.schedule_store.delete(&id, &q.owner).await?;
    if !deleted {
        return Err(ServerError::NotFound(format!(
            "Schedule {} not found",
            id
        )));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}
