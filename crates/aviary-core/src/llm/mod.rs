//! LLM completion client — the collaborator behind `llm_prompt` steps.
//!
//! Providers are called directly over HTTP: `openai` and `deepseek` speak
//! the OpenAI-compatible `chat/completions` API (DeepSeek only differs in
//! base URL), `anthropic` speaks the Messages API. API keys come from the
//! environment at construction time; an unconfigured provider is a clear
//! terminal error, while transport failures are recoverable and re-attempted
//! by the engine's retry wrapper.

use async_trait::async_trait;

use crate::error::LlmError;
use crate::models::LlmConfig;

/// Completion interface the workflow engine depends on. Trait-shaped so
/// tests can substitute a scripted fake.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        config: &LlmConfig,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, LlmError>;
}

/// HTTP-backed client for the supported providers.
pub struct HttpLlmClient {
    client: reqwest::Client,
    openai_key: Option<String>,
    deepseek_key: Option<String>,
    anthropic_key: Option<String>,
}

impl HttpLlmClient {
    pub fn new() -> Self {
        let read_key = |name: &str| {
            let key = std::env::var(name).ok().filter(|k| !k.is_empty());
            if key.is_none() {
                tracing::warn!("{} not set; the corresponding provider is unavailable", name);
            }
            key
        };

        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            openai_key: read_key("OPENAI_API_KEY"),
            deepseek_key: read_key("DEEPSEEK_API_KEY"),
            anthropic_key: read_key("ANTHROPIC_API_KEY"),
        }
    }

    /// Call an OpenAI-compatible `chat/completions` endpoint.
    async fn call_openai_compatible(
        &self,
        base_url: &str,
        api_key: &str,
        model: &str,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));

        let body = serde_json::json!({
            "model": model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_message }
            ]
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Request(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::Request(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(LlmError::Request(format!(
                "API returned {}: {}",
                status, text
            )));
        }

        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| LlmError::Request(format!("Failed to parse response JSON: {}", e)))?;

        let content = json
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(|c| c.as_str())
            .unwrap_or("")
            .to_string();

        Ok(content)
    }

    /// Call the Anthropic Messages API.
    async fn call_anthropic(
        &self,
        api_key: &str,
        model: &str,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, LlmError> {
        let url = "https://api.anthropic.com/v1/messages";

        let mut body = serde_json::json!({
            "model": model,
            "max_tokens": 8192,
            "messages": [
                { "role": "user", "content": user_message }
            ]
        });
        if !system_prompt.is_empty() {
            body["system"] = serde_json::Value::String(system_prompt.to_string());
        }

        let response = self
            .client
            .post(url)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Request(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::Request(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(LlmError::Request(format!(
                "API returned {}: {}",
                status, text
            )));
        }

        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| LlmError::Request(format!("Failed to parse response JSON: {}", e)))?;

        let content = json
            .get("content")
            .and_then(|c| c.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|block| {
                        if block.get("type").and_then(|t| t.as_str()) == Some("text") {
                            block.get("text").and_then(|t| t.as_str()).map(String::from)
                        } else {
                            None
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        Ok(content)
    }
}

impl Default for HttpLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(
        &self,
        config: &LlmConfig,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, LlmError> {
        tracing::info!(
            "Calling LLM provider {} (model: {})",
            config.provider,
            config.model
        );

        match config.provider.as_str() {
            "openai" => {
                let key = self
                    .openai_key
                    .as_deref()
                    .ok_or_else(|| LlmError::ProviderNotConfigured("openai".to_string()))?;
                self.call_openai_compatible(
                    "https://api.openai.com/v1",
                    key,
                    &config.model,
                    system_prompt,
                    user_message,
                )
                .await
            }
            "deepseek" => {
                let key = self
                    .deepseek_key
                    .as_deref()
                    .ok_or_else(|| LlmError::ProviderNotConfigured("deepseek".to_string()))?;
                self.call_openai_compatible(
                    "https://api.deepseek.com/v1",
                    key,
                    &config.model,
                    system_prompt,
                    user_message,
                )
                .await
            }
            "anthropic" => {
                let key = self
                    .anthropic_key
                    .as_deref()
                    .ok_or_else(|| LlmError::ProviderNotConfigured("anthropic".to_string()))?;
                self.call_anthropic(key, &config.model, system_prompt, user_message)
                    .await
            }
            other => Err(LlmError::ProviderNotConfigured(other.to_string())),
        }
    }
}
