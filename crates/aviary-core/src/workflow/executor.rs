//! Workflow Executor — runs one workflow of an agent definition step by
//! step against a mutable context.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{LlmError, StepError, ToolError, WorkflowError};
use crate::llm::LlmClient;
use crate::models::{AgentDefinition, OnFailure, StepKind, StoreAction, WorkflowStep};
use crate::store::DataStore;
use crate::tools::ToolRegistry;
use crate::workflow::retry::{retry_with_backoff, RetryPolicy};
use crate::workflow::template::{self, ExecutionContext};
use crate::workflow::condition;

/// Reserved context key where `send_response` leaves the resolved message
/// for the caller to deliver; the engine itself sends nothing.
pub const LAST_RESPONSE_KEY: &str = "_last_response";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failed,
}

/// One audit record per step attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionLogEntry {
    #[serde(rename = "nodeId")]
    pub node_id: String,
    #[serde(rename = "stepType")]
    pub step_type: String,
    pub status: StepStatus,
    pub timestamp: DateTime<Utc>,
    pub details: serde_json::Value,
}

/// Observability snapshot exposed after (or instead of) a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSummary {
    #[serde(rename = "executionLog")]
    pub execution_log: Vec<ExecutionLogEntry>,
    #[serde(rename = "failedSteps")]
    pub failed_steps: Vec<ExecutionLogEntry>,
    pub context: ExecutionContext,
    #[serde(rename = "totalSteps")]
    pub total_steps: usize,
    #[serde(rename = "failedStepCount")]
    pub failed_step_count: usize,
}

/// Whether the run loop proceeds after a step.
enum StepOutcome {
    Continue,
    Halt,
}

/// The workflow execution engine. One instance owns the state of a single
/// run: the mutable context and the audit log. Concurrency exists only
/// across independent runs, each with its own executor.
pub struct WorkflowExecutor {
    agent: AgentDefinition,
    tools: Arc<ToolRegistry>,
    llm: Arc<dyn LlmClient>,
    data: DataStore,
    context: ExecutionContext,
    execution_log: Vec<ExecutionLogEntry>,
    failed_steps: Vec<ExecutionLogEntry>,
}

impl WorkflowExecutor {
    pub fn new(
        agent: AgentDefinition,
        tools: Arc<ToolRegistry>,
        llm: Arc<dyn LlmClient>,
        data: DataStore,
    ) -> Self {
        Self {
            agent,
            tools,
            llm,
            data,
            context: ExecutionContext::new(),
            execution_log: Vec::new(),
            failed_steps: Vec::new(),
        }
    }

    /// Execute one workflow to completion.
    ///
    /// Steps run strictly sequentially in ascending numeric `nodeId` order;
    /// the audit log records a total order. Fails with `WorkflowError` if
    /// the workflow id is unknown, a `nodeId` is not an integer, or a step
    /// fails without a policy that absorbs the failure.
    pub async fn run(
        &mut self,
        workflow_id: &str,
        initial_context: ExecutionContext,
    ) -> Result<ExecutionContext, WorkflowError> {
        self.context.extend(initial_context);

        let workflow = self
            .agent
            .workflow(workflow_id)
            .cloned()
            .ok_or_else(|| WorkflowError::WorkflowNotFound(workflow_id.to_string()))?;

        // Numeric ordering: "10" runs after "2". A non-numeric id is a
        // configuration error, never retried.
        let mut ordered: Vec<(i64, WorkflowStep)> = Vec::with_capacity(workflow.nodes.len());
        for step in &workflow.nodes {
            let key = step.node_id.trim().parse::<i64>().map_err(|_| {
                WorkflowError::InvalidNodeId {
                    node_id: step.node_id.clone(),
                }
            })?;
            ordered.push((key, step.clone()));
        }
        ordered.sort_by_key(|(key, _)| *key);

        tracing::info!(
            "Running workflow '{}' ({} steps) for agent '{}'",
            workflow_id,
            ordered.len(),
            self.agent.agent_id
        );

        for (_, step) in &ordered {
            match self.execute_step(step).await? {
                StepOutcome::Continue => {}
                StepOutcome::Halt => break,
            }
        }

        Ok(self.context.clone())
    }

    /// Summary of the (possibly failed) run for API responses and scheduler
    /// audit records.
    pub fn execution_summary(&self) -> ExecutionSummary {
        ExecutionSummary {
            execution_log: self.execution_log.clone(),
            failed_steps: self.failed_steps.clone(),
            context: self.context.clone(),
            total_steps: self.execution_log.len(),
            failed_step_count: self.failed_steps.len(),
        }
    }

    /// Run one step and apply its failure policy.
    async fn execute_step(&mut self, step: &WorkflowStep) -> Result<StepOutcome, WorkflowError> {
        match self.execute_node(step).await {
            Ok(outcome) => {
                self.log_entry(step, StepStatus::Success, self.success_details(step));
                Ok(outcome)
            }
            Err(err) => {
                tracing::error!("Step '{}' failed: {}", step.node_id, err);
                let details = serde_json::json!({
                    "error_type": error_kind(&err),
                    "error": err.to_string(),
                    "node": serde_json::to_value(step).unwrap_or_default(),
                });
                self.log_entry(step, StepStatus::Failed, details);

                match step.on_failure {
                    Some(OnFailure::Continue) => {
                        tracing::warn!(
                            "Step '{}' failed, continuing per on_failure policy",
                            step.node_id
                        );
                        Ok(StepOutcome::Continue)
                    }
                    Some(OnFailure::Stop) => {
                        tracing::warn!(
                            "Step '{}' failed, stopping workflow per on_failure policy",
                            step.node_id
                        );
                        Ok(StepOutcome::Halt)
                    }
                    // "retry" adds nothing over the backoff wrapper that
                    // already ran; it falls through to the unhandled path.
                    Some(OnFailure::Retry) | None => {
                        if step.continue_on_error {
                            tracing::warn!(
                                "Step '{}' failed, continuing (continue_on_error)",
                                step.node_id
                            );
                            Ok(StepOutcome::Continue)
                        } else {
                            Err(WorkflowError::Step {
                                node_id: step.node_id.clone(),
                                source: err,
                            })
                        }
                    }
                }
            }
        }
    }

    /// Dispatch one step by kind.
    async fn execute_node(&mut self, step: &WorkflowStep) -> Result<StepOutcome, StepError> {
        match &step.kind {
            StepKind::LlmPrompt {
                prompt,
                output_variable,
            } => {
                let rendered = template::render_template(prompt, &self.context)?;
                let policy = RetryPolicy::for_step(step);
                let llm = self.llm.clone();
                let config = self.agent.llm_config.clone();
                let system_prompt = self.agent.system_prompt.clone();

                let response = retry_with_backoff(&policy, LlmError::is_retryable, || {
                    llm.complete(&config, &system_prompt, &rendered)
                })
                .await?;

                if let Some(var) = output_variable {
                    self.context
                        .insert(var.clone(), serde_json::Value::String(response));
                }
                Ok(StepOutcome::Continue)
            }

            StepKind::DataStore {
                action,
                collection,
                data,
            } => {
                let resolved = template::resolve_value(data, &self.context)?;
                match action {
                    StoreAction::Append => {
                        let collection_name = collection
                            .as_deref()
                            .filter(|c| !c.is_empty())
                            .unwrap_or(&self.agent.data_schema.collection_name);
                        self.data
                            .insert(collection_name, resolved)
                            .await
                            .map_err(|e| StepError::Store(e.to_string()))?;
                        tracing::info!("Stored data in collection '{}'", collection_name);
                        Ok(StepOutcome::Continue)
                    }
                    other => Err(StepError::UnsupportedAction(other.to_string())),
                }
            }

            StepKind::ToolCall {
                tool_id,
                params,
                output_variable,
            } => {
                let tool = self
                    .agent
                    .tool(tool_id)
                    .cloned()
                    .ok_or_else(|| StepError::UnknownTool(tool_id.clone()))?;
                let resolved = template::resolve_params(params, &self.context);
                let policy = RetryPolicy::for_step(step);
                let tools = self.tools.clone();

                let result = retry_with_backoff(&policy, ToolError::is_retryable, || {
                    tools.execute_tool(&tool, &resolved)
                })
                .await?;

                if let Some(var) = output_variable {
                    self.context.insert(var.clone(), result);
                }
                Ok(StepOutcome::Continue)
            }

            StepKind::SendResponse { message } => {
                let resolved = template::resolve_message(message, &self.context)?;
                self.context.insert(
                    LAST_RESPONSE_KEY.to_string(),
                    serde_json::Value::String(resolved),
                );
                Ok(StepOutcome::Continue)
            }

            StepKind::ConditionalLogic { condition } => {
                if condition::evaluate(condition, &self.context)? {
                    Ok(StepOutcome::Continue)
                } else {
                    tracing::info!(
                        "Condition '{}' is false, halting remaining steps",
                        condition
                    );
                    Ok(StepOutcome::Halt)
                }
            }
        }
    }

    fn success_details(&self, step: &WorkflowStep) -> serde_json::Value {
        match &step.kind {
            StepKind::LlmPrompt {
                output_variable, ..
            }
            | StepKind::ToolCall {
                output_variable, ..
            } => serde_json::json!({ "output_variable": output_variable }),
            StepKind::DataStore { collection, .. } => {
                serde_json::json!({ "collection": collection })
            }
            StepKind::SendResponse { .. } => {
                serde_json::json!({ "response": self.context.get(LAST_RESPONSE_KEY) })
            }
            StepKind::ConditionalLogic { condition } => {
                serde_json::json!({ "condition": condition })
            }
        }
    }

    fn log_entry(&mut self, step: &WorkflowStep, status: StepStatus, details: serde_json::Value) {
        let entry = ExecutionLogEntry {
            node_id: step.node_id.clone(),
            step_type: step.kind.type_name().to_string(),
            status,
            timestamp: Utc::now(),
            details,
        };
        if status == StepStatus::Failed {
            self.failed_steps.push(entry.clone());
        }
        self.execution_log.push(entry);
    }
}

fn error_kind(err: &StepError) -> &'static str {
    match err {
        StepError::Tool(ToolError::Validation(_)) => "tool_validation",
        StepError::Tool(ToolError::Security(_)) => "tool_security",
        StepError::Tool(ToolError::Execution(_)) => "tool_execution",
        StepError::Llm(_) => "llm",
        StepError::MissingVariable(_) => "missing_variable",
        StepError::UnknownTool(_) => "unknown_tool",
        StepError::UnsupportedAction(_) => "unsupported_action",
        StepError::InvalidCondition { .. } => "invalid_condition",
        StepError::Store(_) => "store",
    }
}
