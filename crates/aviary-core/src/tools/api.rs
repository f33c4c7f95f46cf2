//! API tool executor — outbound HTTP GET against a configured endpoint.

use async_trait::async_trait;

use crate::error::ToolError;
use crate::models::ToolDefinition;
use crate::tools::validate::{is_valid_url, sanitize_params};
use crate::tools::{ParamMap, ToolExecutor};

const USER_AGENT: &str = "Aviary-Agent-Platform/0.3";

/// Responses above this size are rejected.
const MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

pub struct ApiExecutor {
    client: reqwest::Client,
}

impl ApiExecutor {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolExecutor for ApiExecutor {
    async fn execute(
        &self,
        tool: &ToolDefinition,
        params: &ParamMap,
    ) -> Result<serde_json::Value, ToolError> {
        let endpoint = tool
            .endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                ToolError::Validation(format!("Tool {} has no endpoint configured", tool.tool_id))
            })?;

        if !is_valid_url(endpoint) {
            return Err(ToolError::Security(format!(
                "Invalid or potentially dangerous URL: {}",
                endpoint
            )));
        }

        let sanitized = sanitize_params(params)?;
        let query: Vec<(String, String)> = sanitized
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect();

        let mut request = self
            .client
            .get(endpoint)
            .query(&query)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json");

        if let Some(auth) = &tool.auth {
            match auth.auth_type.as_str() {
                "apiKey" => {
                    if auth.key.len() < 10 {
                        return Err(ToolError::Security(format!(
                            "Invalid API key for tool {}",
                            tool.tool_id
                        )));
                    }
                    request = request.header("Authorization", format!("Bearer {}", auth.key));
                }
                other => {
                    tracing::warn!(
                        "Auth type '{}' not supported for tool {}",
                        other,
                        tool.tool_id
                    );
                }
            }
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ToolError::Execution(format!("Timeout occurred for tool {}", tool.tool_id))
            } else {
                ToolError::Execution(format!("Network error for tool {}: {}", tool.tool_id, e))
            }
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            ToolError::Execution(format!(
                "Failed to read response for tool {}: {}",
                tool.tool_id, e
            ))
        })?;

        if bytes.len() > MAX_RESPONSE_BYTES {
            return Err(ToolError::Execution(format!(
                "Response too large from tool {}",
                tool.tool_id
            )));
        }

        let text = String::from_utf8_lossy(&bytes);
        if !status.is_success() {
            return Err(ToolError::Execution(format!(
                "HTTP error {} for tool {}: {}",
                status.as_u16(),
                tool.tool_id,
                text
            )));
        }

        // Prefer JSON; fall back to wrapping the raw body.
        match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(json) => Ok(json),
            Err(_) => Ok(serde_json::json!({ "text": text })),
        }
    }
}
