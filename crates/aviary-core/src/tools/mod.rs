//! Tool dispatch — maps a tool's declared type to its executor and
//! enforces safety policy around every invocation.
//!
//! # Architecture
//!
//! ```text
//! WorkflowExecutor ──► ToolRegistry::execute_tool
//!                          │  allow-list / id checks / 60s timeout
//!                          ▼
//!                     dyn ToolExecutor (one impl per tool kind)
//!                      API · RSS · DATABASE · MESSAGING · EMAIL · SCHEDULING
//! ```
//!
//! The registry is built once at startup and injected through `AppState`;
//! it is read-shared across concurrent runs and never mutated in steady
//! state.

pub mod api;
pub mod database;
pub mod email;
pub mod feed;
pub mod messaging;
pub mod scheduling;
pub mod validate;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::ToolError;
use crate::models::ToolDefinition;
use crate::store::{DataStore, ScheduleStore};

pub use validate::{is_valid_url, sanitize_params, sanitize_text};

/// Parameters passed to a tool invocation.
pub type ParamMap = HashMap<String, serde_json::Value>;

/// Wall-clock bound on a single tool execution.
const EXECUTION_TIMEOUT: Duration = Duration::from_secs(60);

/// Tool types dispatchable out of the box.
const DEFAULT_ALLOWED_TYPES: &[&str] = &[
    "API",
    "RSS",
    "DATABASE",
    "MESSAGING",
    "EMAIL",
    "SCHEDULING",
];

/// Capability interface implemented by one type per tool kind.
///
/// Executors return their raw result value; the registry normalizes it to
/// a key-value map and attaches execution metadata.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(
        &self,
        tool: &ToolDefinition,
        params: &ParamMap,
    ) -> Result<serde_json::Value, ToolError>;
}

/// The dispatch table: an allow-list of tool types plus the executor for
/// each implemented type. The two are independent so a type can be
/// allow-listed ahead of its implementation during rollout.
pub struct ToolRegistry {
    executors: HashMap<String, Arc<dyn ToolExecutor>>,
    allowed: HashSet<String>,
}

fn type_name_pattern() -> &'static regex::Regex {
    static TYPE_RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    TYPE_RE.get_or_init(|| regex::Regex::new(r"^[A-Z][A-Z0-9_]*$").expect("valid regex"))
}

fn tool_id_pattern() -> &'static regex::Regex {
    static ID_RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    ID_RE.get_or_init(|| regex::Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid regex"))
}

impl ToolRegistry {
    /// An empty registry with the default allow-list and no executors.
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
            allowed: DEFAULT_ALLOWED_TYPES
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }

    /// Build the standard registry: all six built-in executors wired to a
    /// shared HTTP client and the given stores.
    pub fn with_defaults(data_store: DataStore, schedule_store: ScheduleStore) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(45))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let mut registry = Self::new();
        registry.insert_builtin("API", Arc::new(api::ApiExecutor::new(client.clone())));
        registry.insert_builtin("RSS", Arc::new(feed::FeedExecutor::new(client.clone())));
        registry.insert_builtin(
            "DATABASE",
            Arc::new(database::DatabaseExecutor::new(data_store)),
        );
        registry.insert_builtin(
            "MESSAGING",
            Arc::new(messaging::MessagingExecutor::new(client)),
        );
        registry.insert_builtin("EMAIL", Arc::new(email::EmailExecutor::from_env()));
        registry.insert_builtin(
            "SCHEDULING",
            Arc::new(scheduling::SchedulingExecutor::new(schedule_store)),
        );
        registry
    }

    /// Built-in names are static and already on the allow-list.
    fn insert_builtin(&mut self, tool_type: &str, executor: Arc<dyn ToolExecutor>) {
        self.executors.insert(tool_type.to_string(), executor);
        self.allowed.insert(tool_type.to_string());
    }

    /// Register an executor for a tool type. The type name must match
    /// `[A-Z][A-Z0-9_]*`; registering an existing name overwrites it with a
    /// warning. The type is added to the allow-list.
    pub fn register(
        &mut self,
        tool_type: &str,
        executor: Arc<dyn ToolExecutor>,
    ) -> Result<(), ToolError> {
        if !type_name_pattern().is_match(tool_type) {
            return Err(ToolError::Validation(format!(
                "Invalid tool type name: {}",
                tool_type
            )));
        }
        if self.executors.contains_key(tool_type) {
            tracing::warn!("Tool type {} already registered, overwriting", tool_type);
        }
        self.executors.insert(tool_type.to_string(), executor);
        self.allowed.insert(tool_type.to_string());
        Ok(())
    }

    /// Allow-list a tool type without registering an implementation yet.
    pub fn allow_type(&mut self, tool_type: &str) -> Result<(), ToolError> {
        if !type_name_pattern().is_match(tool_type) {
            return Err(ToolError::Validation(format!(
                "Invalid tool type name: {}",
                tool_type
            )));
        }
        self.allowed.insert(tool_type.to_string());
        Ok(())
    }

    /// Remove a tool type: drops both the executor and the allow-list entry.
    pub fn remove(&mut self, tool_type: &str) {
        if self.executors.remove(tool_type).is_some() {
            self.allowed.remove(tool_type);
            tracing::info!("Removed tool type: {}", tool_type);
        } else {
            self.allowed.remove(tool_type);
            tracing::warn!("Tool type {} not found in registry", tool_type);
        }
    }

    pub fn is_allowed(&self, tool_type: &str) -> bool {
        self.allowed.contains(tool_type)
    }

    /// Execute a tool with full policy enforcement.
    ///
    /// Fails closed on disallowed types (`Security`), malformed tool
    /// metadata (`Validation`), and missing executors or timeouts
    /// (`Execution`). On success the result is normalized to a map and
    /// `_tool_metadata` is attached.
    pub async fn execute_tool(
        &self,
        tool: &ToolDefinition,
        params: &ParamMap,
    ) -> Result<serde_json::Value, ToolError> {
        if !self.allowed.contains(&tool.tool_type) {
            return Err(ToolError::Security(format!(
                "Tool type '{}' is not allowed",
                tool.tool_type
            )));
        }

        if tool.tool_id.is_empty() {
            return Err(ToolError::Validation(
                "Tool must have a valid toolId".to_string(),
            ));
        }
        if tool.name.is_empty() {
            return Err(ToolError::Validation(
                "Tool must have a valid name".to_string(),
            ));
        }
        if !tool_id_pattern().is_match(&tool.tool_id) {
            return Err(ToolError::Validation(format!(
                "Invalid tool ID format: {}",
                tool.tool_id
            )));
        }

        let executor = self.executors.get(&tool.tool_type).ok_or_else(|| {
            ToolError::Execution(format!(
                "No executor registered for tool type: {}",
                tool.tool_type
            ))
        })?;

        let started = Instant::now();
        let result = tokio::time::timeout(EXECUTION_TIMEOUT, executor.execute(tool, params))
            .await
            .map_err(|_| {
                ToolError::Execution(format!("Tool {} execution timed out", tool.tool_id))
            })??;

        // Normalize bare values so callers always see a key-value map.
        let mut map = match result {
            serde_json::Value::Object(map) => map,
            other => {
                tracing::warn!(
                    "Tool {} returned non-map result, wrapping",
                    tool.tool_id
                );
                let mut map = serde_json::Map::new();
                map.insert("result".to_string(), other);
                map
            }
        };

        map.insert(
            "_tool_metadata".to_string(),
            serde_json::json!({
                "tool_id": tool.tool_id,
                "tool_type": tool.tool_type,
                "execution_time": started.elapsed().as_secs_f64(),
            }),
        );

        tracing::info!("Tool {} executed successfully", tool.tool_id);
        Ok(serde_json::Value::Object(map))
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoExecutor;

    #[async_trait]
    impl ToolExecutor for EchoExecutor {
        async fn execute(
            &self,
            _tool: &ToolDefinition,
            params: &ParamMap,
        ) -> Result<serde_json::Value, ToolError> {
            Ok(serde_json::json!({ "echo": params.len() }))
        }
    }

    struct BareExecutor;

    #[async_trait]
    impl ToolExecutor for BareExecutor {
        async fn execute(
            &self,
            _tool: &ToolDefinition,
            _params: &ParamMap,
        ) -> Result<serde_json::Value, ToolError> {
            Ok(serde_json::json!(42))
        }
    }

    struct SlowExecutor;

    #[async_trait]
    impl ToolExecutor for SlowExecutor {
        async fn execute(
            &self,
            _tool: &ToolDefinition,
            _params: &ParamMap,
        ) -> Result<serde_json::Value, ToolError> {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok(serde_json::json!({}))
        }
    }

    fn tool(tool_id: &str, tool_type: &str) -> ToolDefinition {
        ToolDefinition {
            tool_id: tool_id.to_string(),
            tool_type: tool_type.to_string(),
            name: "Test Tool".to_string(),
            description: "A test tool".to_string(),
            endpoint: None,
            url: None,
            auth: None,
            config: HashMap::new(),
        }
    }

    fn registry_with(tool_type: &str, exec: Arc<dyn ToolExecutor>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(tool_type, exec).unwrap();
        registry
    }

    #[tokio::test]
    async fn test_disallowed_type_fails_closed() {
        let registry = ToolRegistry::new();
        let err = registry
            .execute_tool(&tool("t", "SHELL"), &ParamMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Security(_)));
    }

    #[tokio::test]
    async fn test_missing_tool_id_rejected() {
        let registry = registry_with("API", Arc::new(EchoExecutor));
        let err = registry
            .execute_tool(&tool("", "API"), &ParamMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
    }

    #[tokio::test]
    async fn test_malformed_tool_id_rejected() {
        let registry = registry_with("API", Arc::new(EchoExecutor));
        let err = registry
            .execute_tool(&tool("test<script>", "API"), &ParamMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
    }

    #[tokio::test]
    async fn test_allowed_but_unregistered_type() {
        // Default allow-list contains EMAIL, but this registry has no
        // executor for it: independent checks, distinct error.
        let registry = ToolRegistry::new();
        let err = registry
            .execute_tool(&tool("mailer", "EMAIL"), &ParamMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Execution(_)));
    }

    #[tokio::test]
    async fn test_metadata_attached() {
        let registry = registry_with("API", Arc::new(EchoExecutor));
        let result = registry
            .execute_tool(&tool("test_api", "API"), &ParamMap::new())
            .await
            .unwrap();
        let meta = &result["_tool_metadata"];
        assert_eq!(meta["tool_id"], "test_api");
        assert_eq!(meta["tool_type"], "API");
        assert!(meta["execution_time"].is_number());
    }

    #[tokio::test]
    async fn test_bare_result_wrapped() {
        let registry = registry_with("API", Arc::new(BareExecutor));
        let result = registry
            .execute_tool(&tool("t", "API"), &ParamMap::new())
            .await
            .unwrap();
        assert_eq!(result["result"], 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execution_timeout() {
        let registry = registry_with("API", Arc::new(SlowExecutor));
        let err = registry
            .execute_tool(&tool("slow_tool", "API"), &ParamMap::new())
            .await
            .unwrap_err();
        match err {
            ToolError::Execution(msg) => assert!(msg.contains("timed out")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_register_validates_type_name() {
        let mut registry = ToolRegistry::new();
        assert!(registry.register("lowercase", Arc::new(EchoExecutor)).is_err());
        assert!(registry.register("WEBHOOK_V2", Arc::new(EchoExecutor)).is_ok());
        assert!(registry.is_allowed("WEBHOOK_V2"));
    }

    #[tokio::test]
    async fn test_allow_type_ahead_of_implementation() {
        let mut registry = ToolRegistry::new();
        registry.allow_type("GRAPHQL").unwrap();
        assert!(registry.is_allowed("GRAPHQL"));
        // Allow-listed but unimplemented: execution error, not a security one.
        let err = registry
            .execute_tool(&tool("gql", "GRAPHQL"), &ParamMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Execution(_)));
    }

    #[test]
    fn test_remove_drops_allow_list_entry() {
        let mut registry = registry_with("API", Arc::new(EchoExecutor));
        assert!(registry.is_allowed("API"));
        registry.remove("API");
        assert!(!registry.is_allowed("API"));
    }
}
