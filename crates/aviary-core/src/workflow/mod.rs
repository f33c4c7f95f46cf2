//! Workflow execution engine.
//!
//! Runs one named workflow of an agent definition: steps execute strictly
//! sequentially in ascending numeric `nodeId` order against a mutable
//! context, with per-step retry for LLM and tool calls, per-step failure
//! policy, and an execution-audit log.
//!
//! ```text
//! AgentDefinition ──► WorkflowExecutor::run(workflow_id, initial_context)
//!                         │
//!                         ├── llm_prompt ──► LlmClient (retry + backoff)
//!                         ├── tool_call ───► ToolRegistry (retry + backoff)
//!                         ├── data_store ──► DataStore
//!                         ├── send_response / conditional_logic
//!                         ▼
//!                     final context + ExecutionSummary
//! ```

pub mod condition;
pub mod executor;
pub mod retry;
pub mod template;

pub use executor::{
    ExecutionLogEntry, ExecutionSummary, StepStatus, WorkflowExecutor, LAST_RESPONSE_KEY,
};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use template::ExecutionContext;
