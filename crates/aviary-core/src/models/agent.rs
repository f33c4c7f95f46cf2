//! Agent definition types — the configuration bundle a workflow run
//! executes against.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::workflow::WorkflowDefinition;

/// Authentication settings for a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolAuth {
    /// Auth scheme: "apiKey" is the only scheme the API executor honors.
    #[serde(rename = "type")]
    pub auth_type: String,
    pub key: String,
}

/// An external capability an agent can invoke from a workflow step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "toolId")]
    pub tool_id: String,

    /// Tool type, matched against the dispatcher's allow-list
    /// (API, RSS, DATABASE, MESSAGING, EMAIL, SCHEDULING).
    #[serde(rename = "type")]
    pub tool_type: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Target endpoint for API tools.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Feed URL for RSS tools.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub auth: Option<ToolAuth>,

    /// Free-form per-tool configuration (SMTP settings, default database
    /// operation, bot token override, ...).
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
}

/// Schema metadata for an agent's user-data collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSchema {
    #[serde(rename = "collectionName")]
    pub collection_name: String,

    /// JSON-schema-shaped description of the documents; informational.
    #[serde(rename = "schema", default)]
    pub schema_definition: serde_json::Value,
}

/// Which LLM backs the agent's prompt steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

/// A scheduled workflow trigger. The cron expression is stored verbatim;
/// firing is owned by the scheduler layer, not the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(rename = "scheduleId")]
    pub schedule_id: String,
    pub cron: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "workflowId")]
    pub workflow_id: String,
}

/// A complete agent: system prompt, LLM settings, tools, workflows, and
/// schedules, owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Username of the agent's creator.
    pub owner: String,

    #[serde(rename = "agentId")]
    pub agent_id: String,

    #[serde(rename = "agentName")]
    pub agent_name: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(rename = "systemPrompt")]
    pub system_prompt: String,

    #[serde(rename = "llmConfig", default)]
    pub llm_config: LlmConfig,

    #[serde(rename = "dataSchema")]
    pub data_schema: DataSchema,

    #[serde(default)]
    pub tools: Vec<ToolDefinition>,

    #[serde(default)]
    pub workflows: Vec<WorkflowDefinition>,

    #[serde(default)]
    pub schedules: Vec<Schedule>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl AgentDefinition {
    /// Parse an agent definition from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("Failed to parse agent JSON: {}", e))
    }

    /// Parse an agent definition from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        serde_yaml::from_str(yaml).map_err(|e| format!("Failed to parse agent YAML: {}", e))
    }

    /// Load an agent definition from a file path (.json, .yaml or .yml).
    pub fn from_file(path: &str) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read agent file '{}': {}", path, e))?;
        if path.ends_with(".yaml") || path.ends_with(".yml") {
            Self::from_yaml(&content)
        } else {
            Self::from_json(&content)
        }
    }

    /// Check structural invariants: tool ids unique and well-formed,
    /// workflow ids unique.
    pub fn validate(&self) -> Result<(), String> {
        let id_re = regex::Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid regex");

        let mut tool_ids = std::collections::HashSet::new();
        for tool in &self.tools {
            if !id_re.is_match(&tool.tool_id) {
                return Err(format!("Invalid tool id format: {}", tool.tool_id));
            }
            if !tool_ids.insert(tool.tool_id.as_str()) {
                return Err(format!("Duplicate tool id: {}", tool.tool_id));
            }
        }

        let mut workflow_ids = std::collections::HashSet::new();
        for wf in &self.workflows {
            if !workflow_ids.insert(wf.workflow_id.as_str()) {
                return Err(format!("Duplicate workflow id: {}", wf.workflow_id));
            }
        }

        Ok(())
    }

    /// Look up a tool by id.
    pub fn tool(&self, tool_id: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|t| t.tool_id == tool_id)
    }

    /// Look up a workflow by id.
    pub fn workflow(&self, workflow_id: &str) -> Option<&WorkflowDefinition> {
        self.workflows.iter().find(|w| w.workflow_id == workflow_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_agent() {
        let json = r#"{
            "owner": "test_user",
            "agentId": "dietitian_pro_123",
            "agentName": "Dietitian Pro",
            "systemPrompt": "You are an expert dietitian.",
            "dataSchema": { "collectionName": "dietitian_user_data" }
        }"#;
        let agent = AgentDefinition::from_json(json).unwrap();
        assert_eq!(agent.agent_id, "dietitian_pro_123");
        assert_eq!(agent.version, "1.0");
        assert_eq!(agent.llm_config.provider, "openai");
        assert_eq!(agent.llm_config.model, "gpt-3.5-turbo");
        assert!(agent.tools.is_empty());
        assert!(agent.workflows.is_empty());
    }

    #[test]
    fn test_parse_agent_with_tools() {
        let json = r#"{
            "owner": "test_user",
            "agentId": "news_bot",
            "agentName": "News Bot",
            "systemPrompt": "You summarize news.",
            "llmConfig": { "provider": "deepseek", "model": "deepseek-chat" },
            "dataSchema": { "collectionName": "news_data" },
            "tools": [
                {
                    "toolId": "hn_feed",
                    "type": "RSS",
                    "name": "Hacker News",
                    "description": "Front page feed",
                    "url": "https://news.ycombinator.com/rss"
                },
                {
                    "toolId": "weather_api",
                    "type": "API",
                    "name": "Weather",
                    "endpoint": "https://api.example.com/weather",
                    "auth": { "type": "apiKey", "key": "test_key_123456" }
                }
            ]
        }"#;
        let agent = AgentDefinition::from_json(json).unwrap();
        assert_eq!(agent.llm_config.provider, "deepseek");
        assert_eq!(agent.tools.len(), 2);
        assert_eq!(agent.tools[0].tool_type, "RSS");
        assert_eq!(
            agent.tools[1].auth.as_ref().unwrap().auth_type,
            "apiKey"
        );
        assert!(agent.validate().is_ok());
        assert!(agent.tool("hn_feed").is_some());
        assert!(agent.tool("missing").is_none());
    }

    #[test]
    fn test_validate_rejects_duplicate_tool_ids() {
        let json = r#"{
            "owner": "u",
            "agentId": "a",
            "agentName": "A",
            "systemPrompt": "p",
            "dataSchema": { "collectionName": "c" },
            "tools": [
                { "toolId": "dup", "type": "API", "name": "One" },
                { "toolId": "dup", "type": "RSS", "name": "Two" }
            ]
        }"#;
        let agent = AgentDefinition::from_json(json).unwrap();
        assert!(agent.validate().unwrap_err().contains("Duplicate tool id"));
    }

    #[test]
    fn test_validate_rejects_malformed_tool_id() {
        let json = r#"{
            "owner": "u",
            "agentId": "a",
            "agentName": "A",
            "systemPrompt": "p",
            "dataSchema": { "collectionName": "c" },
            "tools": [ { "toolId": "bad id!", "type": "API", "name": "One" } ]
        }"#;
        let agent = AgentDefinition::from_json(json).unwrap();
        assert!(agent
            .validate()
            .unwrap_err()
            .contains("Invalid tool id format"));
    }

    #[test]
    fn test_from_file_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.json");
        std::fs::write(
            &path,
            r#"{
                "owner": "u",
                "agentId": "file_agent",
                "agentName": "File Agent",
                "systemPrompt": "p",
                "dataSchema": { "collectionName": "c" }
            }"#,
        )
        .unwrap();
        let agent = AgentDefinition::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(agent.agent_id, "file_agent");
    }

    #[test]
    fn test_parse_agent_yaml() {
        let yaml = r#"
owner: test_user
agentId: yaml_agent
agentName: Yaml Agent
systemPrompt: "You are helpful."
dataSchema:
  collectionName: yaml_data
schedules:
  - scheduleId: daily
    cron: "0 9 * * *"
    workflowId: morning_flow
"#;
        let agent = AgentDefinition::from_yaml(yaml).unwrap();
        assert_eq!(agent.agent_id, "yaml_agent");
        assert_eq!(agent.schedules.len(), 1);
        assert_eq!(agent.schedules[0].cron, "0 9 * * *");
    }
}
