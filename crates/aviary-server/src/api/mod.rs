pub mod agents;
pub mod runs;
pub mod schedules;

use axum::Router;

use aviary_core::state::AppState;

/// Build the complete API router with all sub-routes.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/api/agents", agents::router().merge(runs::router()))
        .nest("/api/schedules", schedules::router())
}
