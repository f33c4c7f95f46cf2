//! Workflow definition types.
//!
//! A workflow is an ordered list of typed steps executed against a mutable
//! context. Steps are a proper sum type tagged by `type` — each variant
//! carries only the fields it uses — while retry/failure policy lives in
//! the shared step envelope:
//!
//! ```json
//! {
//!   "workflowId": "daily_digest",
//!   "trigger": "digest",
//!   "nodes": [
//!     { "nodeId": "1", "type": "tool_call", "toolId": "hn_feed",
//!       "params": { "limit": 5 }, "output_variable": "headlines" },
//!     { "nodeId": "2", "type": "llm_prompt",
//!       "prompt": "Summarize: {headlines}", "output_variable": "summary" },
//!     { "nodeId": "3", "type": "send_response", "message": "$summary" }
//!   ]
//! }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A named, ordered sequence of steps triggered by user text or a schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(rename = "workflowId")]
    pub workflow_id: String,

    #[serde(default)]
    pub description: String,

    /// Matched against free text to decide invocation; the matching itself
    /// is owned by the caller, not the engine.
    #[serde(default)]
    pub trigger: String,

    /// Steps, executed in ascending numeric `nodeId` order (not declaration
    /// order).
    pub nodes: Vec<WorkflowStep>,
}

/// What to do when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFailure {
    /// Swallow the error and proceed to the next step.
    Continue,
    /// Swallow the error but halt the run gracefully after this step.
    Stop,
    /// Accepted for compatibility; behaves like an unhandled failure, since
    /// retryable step kinds already run under the backoff wrapper.
    Retry,
}

/// Action of a `data_store` step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreAction {
    Append,
    Update,
}

impl std::fmt::Display for StoreAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreAction::Append => write!(f, "append"),
            StoreAction::Update => write!(f, "update"),
        }
    }
}

/// The typed payload of one workflow step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    /// Render `prompt` against the context (`{var}` placeholders) and send
    /// it to the agent's LLM.
    LlmPrompt {
        prompt: String,
        #[serde(default)]
        output_variable: Option<String>,
    },

    /// Store resolved `data` (literal or `$variable`) in a user-data
    /// collection.
    DataStore {
        action: StoreAction,
        #[serde(default)]
        collection: Option<String>,
        data: serde_json::Value,
    },

    /// Invoke one of the agent's tools with `$variable`-resolved params.
    ToolCall {
        #[serde(rename = "toolId")]
        tool_id: String,
        #[serde(default)]
        params: HashMap<String, serde_json::Value>,
        #[serde(default)]
        output_variable: Option<String>,
    },

    /// Resolve `message` and leave it at the reserved context key for the
    /// caller to deliver.
    SendResponse { message: String },

    /// Evaluate `condition`; false halts the remaining steps.
    ConditionalLogic { condition: String },
}

impl StepKind {
    /// Short name used in execution log entries.
    pub fn type_name(&self) -> &'static str {
        match self {
            StepKind::LlmPrompt { .. } => "llm_prompt",
            StepKind::DataStore { .. } => "data_store",
            StepKind::ToolCall { .. } => "tool_call",
            StepKind::SendResponse { .. } => "send_response",
            StepKind::ConditionalLogic { .. } => "conditional_logic",
        }
    }
}

/// One unit of workflow execution: the typed payload plus the shared
/// retry/failure-policy envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Integer ordering key, stored as a string.
    #[serde(rename = "nodeId")]
    pub node_id: String,

    #[serde(flatten)]
    pub kind: StepKind,

    #[serde(default)]
    pub on_failure: Option<OnFailure>,

    #[serde(default)]
    pub continue_on_error: bool,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff in seconds; doubles per attempt.
    #[serde(default = "default_retry_delay")]
    pub retry_delay: f64,

    /// Advisory per-step timeout in seconds; the dispatcher-level timeout
    /// is the enforced bound.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Consumed by the tool layer, not the engine.
    #[serde(default = "default_true")]
    pub validate_input: bool,

    /// Consumed by the tool layer, not the engine.
    #[serde(default = "default_true")]
    pub sanitize_output: bool,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> f64 {
    1.0
}

fn default_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}
