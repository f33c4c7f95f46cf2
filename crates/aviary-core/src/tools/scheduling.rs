//! SCHEDULING tool executor — lets agents create and manage scheduled
//! tasks.
//!
//! Only the records are managed here. Cron/interval firing belongs to the
//! scheduler layer; cron expressions are stored verbatim, and `next_run`
//! is pre-computed only where it is cheap (`once`, `interval`).

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::ToolError;
use crate::models::ToolDefinition;
use crate::store::{CreateTaskInput, ScheduleStore};
use crate::tools::{ParamMap, ToolExecutor};

pub struct SchedulingExecutor {
    store: ScheduleStore,
}

impl SchedulingExecutor {
    pub fn new(store: ScheduleStore) -> Self {
        Self { store }
    }
}

fn operation<'a>(tool: &'a ToolDefinition, params: &'a ParamMap) -> &'a str {
    params
        .get("operation")
        .and_then(|v| v.as_str())
        .or_else(|| tool.config.get("operation").and_then(|v| v.as_str()))
        .unwrap_or("create_task")
}

fn required_str<'a>(params: &'a ParamMap, key: &str) -> Result<&'a str, ToolError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::Validation(format!("{} parameter is required", key)))
}

/// Compute the first run time for `once` and `interval` schedules; cron is
/// left to the scheduler layer.
fn next_run_for(
    schedule_kind: &str,
    schedule_params: &serde_json::Value,
) -> Result<Option<DateTime<Utc>>, ToolError> {
    match schedule_kind {
        "once" => {
            let run_date = schedule_params
                .get("run_date")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    ToolError::Validation("Invalid schedule type or parameters".to_string())
                })?;
            let parsed = DateTime::parse_from_rfc3339(run_date).map_err(|_| {
                ToolError::Validation(format!("Invalid run_date: {}", run_date))
            })?;
            Ok(Some(parsed.with_timezone(&Utc)))
        }
        "interval" => {
            let field = |name: &str| {
                schedule_params
                    .get(name)
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0)
            };
            let interval = Duration::seconds(field("seconds"))
                + Duration::minutes(field("minutes"))
                + Duration::hours(field("hours"))
                + Duration::days(field("days"));
            if interval <= Duration::zero() {
                return Err(ToolError::Validation(
                    "Invalid schedule type or parameters".to_string(),
                ));
            }
            Ok(Some(Utc::now() + interval))
        }
        "cron" => {
            if schedule_params.get("cron").and_then(|v| v.as_str()).is_none() {
                return Err(ToolError::Validation(
                    "cron schedule requires a cron expression".to_string(),
                ));
            }
            Ok(None)
        }
        _ => Err(ToolError::Validation(
            "Invalid schedule type or parameters".to_string(),
        )),
    }
}

#[async_trait]
impl ToolExecutor for SchedulingExecutor {
    async fn execute(
        &self,
        tool: &ToolDefinition,
        params: &ParamMap,
    ) -> Result<serde_json::Value, ToolError> {
        let op = operation(tool, params);
        let store_err = |e: crate::error::ServerError| {
            ToolError::Execution(format!("Scheduling operation failed: {}", e))
        };

        let result = match op {
            "create_task" => {
                let task_name = required_str(params, "task_name")?;
                let task_type = required_str(params, "task_type")?;
                let schedule_kind = required_str(params, "schedule_type")?;
                let agent_id = required_str(params, "agent_id")?;
                let owner = required_str(params, "user_id")?;
                let schedule_params = params
                    .get("schedule_params")
                    .cloned()
                    .unwrap_or_else(|| serde_json::json!({}));
                let task_params = params
                    .get("task_params")
                    .cloned()
                    .unwrap_or_else(|| serde_json::json!({}));

                let next_run_at = next_run_for(schedule_kind, &schedule_params)?;

                let task = self
                    .store
                    .create(CreateTaskInput {
                        task_name: task_name.to_string(),
                        task_type: task_type.to_string(),
                        schedule_kind: schedule_kind.to_string(),
                        schedule_params,
                        task_params,
                        agent_id: agent_id.to_string(),
                        owner: owner.to_string(),
                        next_run_at,
                    })
                    .await
                    .map_err(store_err)?;

                tracing::info!("Created scheduled task '{}' ({})", task.task_name, task.id);
                serde_json::json!({
                    "success": true,
                    "task_id": task.id,
                    "message": format!("Scheduled task '{}' created successfully", task.task_name),
                    "next_run": task.next_run_at.map(|d| d.to_rfc3339()),
                })
            }
            "list_tasks" => {
                let agent_id = params.get("agent_id").and_then(|v| v.as_str());
                let owner = params.get("user_id").and_then(|v| v.as_str());
                let tasks = self.store.list(agent_id, owner).await.map_err(store_err)?;
                serde_json::json!({
                    "success": true,
                    "tasks": tasks,
                })
            }
            "delete_task" => {
                let task_id = required_str(params, "task_id")?;
                let owner = required_str(params, "user_id")?;
                let deleted = self.store.delete(task_id, owner).await.map_err(store_err)?;
                if deleted {
                    serde_json::json!({
                        "success": true,
                        "message": "Task deleted successfully",
                    })
                } else {
                    serde_json::json!({
                        "success": false,
                        "error": "Task not found or access denied",
                    })
                }
            }
            other => {
                return Err(ToolError::Execution(format!("Unknown operation: {}", other)));
            }
        };

        Ok(result)
    }
}
