//! MESSAGING tool executor — outbound sends via the Telegram Bot API.
//!
//! The engine never delivers responses itself; this executor is the
//! outbound leaf a `tool_call` step uses when a workflow wants to push a
//! message to a chat.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::ToolError;
use crate::models::ToolDefinition;
use crate::tools::validate::sanitize_params;
use crate::tools::{ParamMap, ToolExecutor};

const SEND_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

pub struct MessagingExecutor {
    client: reqwest::Client,
    bot_token: Option<String>,
}

impl MessagingExecutor {
    /// Token comes from `TELEGRAM_BOT_TOKEN`; a tool's `config.bot_token`
    /// overrides it per tool.
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_token(
            client,
            std::env::var("TELEGRAM_BOT_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
        )
    }

    pub fn with_token(client: reqwest::Client, bot_token: Option<String>) -> Self {
        Self { client, bot_token }
    }
}

#[async_trait]
impl ToolExecutor for MessagingExecutor {
    async fn execute(
        &self,
        tool: &ToolDefinition,
        params: &ParamMap,
    ) -> Result<serde_json::Value, ToolError> {
        let token = tool
            .config
            .get("bot_token")
            .and_then(|v| v.as_str())
            .filter(|t| !t.is_empty())
            .map(String::from)
            .or_else(|| self.bot_token.clone())
            .ok_or_else(|| {
                ToolError::Execution("TELEGRAM_BOT_TOKEN environment variable not set".to_string())
            })?;

        let chat_id = params
            .get("chat_id")
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ToolError::Validation("chat_id parameter is required".to_string()))?;
        let message = params
            .get("message")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ToolError::Validation("message parameter is required".to_string()))?;

        let mut to_sanitize = HashMap::new();
        to_sanitize.insert("chat_id".to_string(), serde_json::json!(chat_id));
        to_sanitize.insert("message".to_string(), serde_json::json!(message));
        let sanitized = sanitize_params(&to_sanitize)?;
        let chat_id = sanitized["chat_id"].as_str().unwrap_or(&chat_id).to_string();
        let message = sanitized["message"].as_str().unwrap_or(message).to_string();

        let url = format!("https://api.telegram.org/bot{}/sendMessage", token);
        let payload = serde_json::json!({
            "chat_id": chat_id,
            "text": message,
            "parse_mode": "Markdown",
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .timeout(SEND_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolError::Execution(format!(
                        "Timeout while sending message to {}",
                        chat_id
                    ))
                } else {
                    ToolError::Execution(format!("Network error sending message: {}", e))
                }
            })?;

        let status = response.status();
        let body: serde_json::Value = response.json().await.unwrap_or_default();

        if !status.is_success() {
            return Err(ToolError::Execution(format!(
                "Telegram API error: {} - {}",
                status.as_u16(),
                body
            )));
        }

        tracing::info!("Message sent to chat {}", chat_id);
        Ok(serde_json::json!({
            "success": true,
            "message_id": body["result"]["message_id"],
            "chat_id": chat_id,
            "status": "sent",
        }))
    }
}
