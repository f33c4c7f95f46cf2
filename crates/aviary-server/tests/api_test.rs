//! Integration tests for the HTTP API.
//!
//! These exercise the same router the binary serves, against an in-memory
//! SQLite database and a scripted LLM client.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use aviary_core::error::LlmError;
use aviary_core::llm::LlmClient;
use aviary_core::models::LlmConfig;
use aviary_core::state::{AppState, AppStateInner};
use aviary_core::Database;

struct StubLlm;

#[async_trait]
impl LlmClient for StubLlm {
    async fn complete(
        &self,
        _config: &LlmConfig,
        _system_prompt: &str,
        user_message: &str,
    ) -> Result<String, LlmError> {
        Ok(format!("stub:{}", user_message))
    }
}

fn test_app() -> axum::Router {
    let db = Database::open_in_memory().expect("Failed to open in-memory database");
    let state: AppState = Arc::new(AppStateInner::with_llm(db, Arc::new(StubLlm)));
    aviary_server::app(state)
}

async fn request(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("valid request");

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

fn sample_agent() -> serde_json::Value {
    serde_json::json!({
        "owner": "alice",
        "agentId": "echo_agent",
        "agentName": "Echo Agent",
        "systemPrompt": "You echo things.",
        "dataSchema": { "collectionName": "echo_data" },
        "workflows": [
            {
                "workflowId": "greet",
                "trigger": "greet",
                "nodes": [
                    {
                        "nodeId": "1",
                        "type": "llm_prompt",
                        "prompt": "greet {name}",
                        "output_variable": "greeting"
                    },
                    { "nodeId": "2", "type": "send_response", "message": "$greeting" }
                ]
            },
            {
                "workflowId": "doomed",
                "trigger": "doomed",
                "nodes": [
                    { "nodeId": "1", "type": "send_response", "message": "$nonexistent" }
                ]
            }
        ]
    })
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let (status, body) = request(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_agent_crud() {
    let app = test_app();

    let (status, body) = request(&app, "POST", "/api/agents", Some(sample_agent())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agent"]["agentId"], "echo_agent");

    let (status, body) = request(&app, "GET", "/api/agents?owner=alice", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agents"].as_array().unwrap().len(), 1);

    let (status, body) = request(&app, "GET", "/api/agents/alice/echo_agent", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agent"]["agentName"], "Echo Agent");

    let (status, _) = request(&app, "GET", "/api/agents/bob/echo_agent", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = request(&app, "DELETE", "/api/agents/alice/echo_agent", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);
}

#[tokio::test]
async fn test_create_agent_validates_definition() {
    let app = test_app();
    let mut agent = sample_agent();
    agent["tools"] = serde_json::json!([
        { "toolId": "dup", "type": "API", "name": "One" },
        { "toolId": "dup", "type": "API", "name": "Two" }
    ]);
    let (status, _) = request(&app, "POST", "/api/agents", Some(agent)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_run_workflow() {
    let app = test_app();
    request(&app, "POST", "/api/agents", Some(sample_agent())).await;

    let (status, body) = request(
        &app,
        "POST",
        "/api/agents/alice/echo_agent/workflows/greet/run",
        Some(serde_json::json!({ "context": { "name": "Ada" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["context"]["_last_response"], "stub:greet Ada");
    assert_eq!(body["summary"]["totalSteps"], 2);
    assert_eq!(body["summary"]["failedStepCount"], 0);
}

#[tokio::test]
async fn test_run_unknown_workflow_is_404() {
    let app = test_app();
    request(&app, "POST", "/api/agents", Some(sample_agent())).await;

    let (status, body) = request(
        &app,
        "POST",
        "/api/agents/alice/echo_agent/workflows/nope/run",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn test_run_failure_preserves_summary() {
    let app = test_app();
    request(&app, "POST", "/api/agents", Some(sample_agent())).await;

    let (status, body) = request(
        &app,
        "POST",
        "/api/agents/alice/echo_agent/workflows/doomed/run",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    // Summarized message only, with the failing step in the summary.
    assert!(body["error"].as_str().unwrap().contains("nonexistent"));
    assert_eq!(body["summary"]["failedStepCount"], 1);
    assert_eq!(body["summary"]["failedSteps"][0]["nodeId"], "1");
}
