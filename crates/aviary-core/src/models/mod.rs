//! Data model for the Aviary platform.
//!
//! Agent definitions are externally supplied and read-only to the engine:
//! each workflow run receives a snapshot and never mutates it.

pub mod agent;
pub mod workflow;

pub use agent::{AgentDefinition, DataSchema, LlmConfig, Schedule, ToolAuth, ToolDefinition};
pub use workflow::{OnFailure, StepKind, StoreAction, WorkflowDefinition, WorkflowStep};
