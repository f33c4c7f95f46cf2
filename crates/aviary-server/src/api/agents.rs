use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use aviary_core::error::ServerError;
use aviary_core::models::AgentDefinition;
use aviary_core::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_agents).post(create_agent))
        .route("/{owner}/{agent_id}", get(get_agent).delete(delete_agent))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    owner: String,
}

async fn list_agents(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let agents = state.agent_store.list_by_owner(&q.owner).await?;
    Ok(Json(serde_json::json!({ "agents": agents })))
}

async fn create_agent(
    State(state): State<AppState>,
    Json(agent): Json<AgentDefinition>,
) -> Result<Json<serde_json::Value>, ServerError> {
    agent.validate().map_err(ServerError::BadRequest)?;
    state.agent_store.save(&agent).await?;
    Ok(Json(serde_json::json!({ "agent": agent })))
}

async fn get_agent(
    State(state): State<AppState>,
    Path((owner, agent_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ServerError> {
    match state.agent_store.get(&owner, &agent_id).await? {
        Some(agent) => Ok(Json(serde_json::json!({ "agent": agent }))),
        None => Err(ServerError::NotFound(format!(
            "Agent {} not found",
            agent_id
        ))),
    }
}

async fn delete_agent(
    State(state): State<AppState>,
    Path((owner, agent_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let deleted = state.agent_store.delete(&owner, &agent_id).await?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}
