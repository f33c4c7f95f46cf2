//! Aviary Server — HTTP backend for the Aviary agent platform.
//!
//! A thin axum adapter over `aviary-core`: agent CRUD, workflow runs, and
//! schedule listing. Authentication, session storage, and cron firing are
//! owned by other services in front of or behind this one.

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use aviary_core::db::Database;
use aviary_core::state::{AppState, AppStateInner};

/// Configuration for the Aviary backend server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3420,
            db_path: "aviary.db".to_string(),
        }
    }
}

/// Create a shared `AppState` from a database path.
pub fn create_app_state(db_path: &str) -> Result<AppState, String> {
    let db = Database::open(db_path).map_err(|e| format!("Failed to open database: {}", e))?;
    Ok(Arc::new(AppStateInner::new(db)))
}

/// Build the application router for the given state.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api::api_router())
        .route("/api/health", axum::routing::get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the backend server. Returns the actual address it listens on.
pub async fn start_server(config: ServerConfig) -> Result<SocketAddr, String> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aviary_server=info,aviary_core=info,tower_http=info".into()),
        )
        .init();

    tracing::info!(
        "Starting Aviary backend server on {}:{}",
        config.host,
        config.port
    );

    let state = create_app_state(&config.db_path)?;
    let app = app(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get local address: {}", e))?;

    tracing::info!("Aviary backend server listening on {}", local_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(local_addr)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "server": "aviary-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
