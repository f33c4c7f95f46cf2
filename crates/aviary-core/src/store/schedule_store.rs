//! Scheduled-task persistence for the SCHEDULING tool.
//!
//! The store only manages the records; firing them (cron evaluation,
//! interval ticking) belongs to the scheduler layer outside this crate.

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::Database;
use crate::error::ServerError;

/// A task created by an agent through the SCHEDULING tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTask {
    pub id: String,
    pub task_name: String,
    /// What the task does when fired: "telegram_message", "email",
    /// "workflow", ...
    pub task_type: String,
    /// "once", "interval" or "cron".
    pub schedule_kind: String,
    pub schedule_params: serde_json::Value,
    pub task_params: serde_json::Value,
    pub agent_id: String,
    pub owner: String,
    pub status: String,
    pub run_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a new scheduled task.
#[derive(Debug, Clone)]
pub struct CreateTaskInput {
    pub task_name: String,
    pub task_type: String,
    pub schedule_kind: String,
    pub schedule_params: serde_json::Value,
    pub task_params: serde_json::Value,
    pub agent_id: String,
    pub owner: String,
    pub next_run_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct ScheduleStore {
    db: Database,
}

impl ScheduleStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create(&self, input: CreateTaskInput) -> Result<ScheduledTask, ServerError> {
        let task = ScheduledTask {
            id: Uuid::new_v4().to_string(),
            task_name: input.task_name,
            task_type: input.task_type,
            schedule_kind: input.schedule_kind,
            schedule_params: input.schedule_params,
            task_params: input.task_params,
            agent_id: input.agent_id,
            owner: input.owner,
            status: "active".to_string(),
            run_count: 0,
            last_run_at: None,
            next_run_at: input.next_run_at,
            created_at: Utc::now(),
        };

        let t = task.clone();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO schedules
                       (id, task_name, task_type, schedule_kind, schedule_params,
                        task_params, agent_id, owner, status, run_count,
                        last_run_at, next_run_at, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                    rusqlite::params![
                        t.id,
                        t.task_name,
                        t.task_type,
                        t.schedule_kind,
                        t.schedule_params.to_string(),
                        t.task_params.to_string(),
                        t.agent_id,
                        t.owner,
                        t.status,
                        t.run_count,
                        t.last_run_at.map(|d| d.timestamp_millis()),
                        t.next_run_at.map(|d| d.timestamp_millis()),
                        t.created_at.timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await?;

        Ok(task)
    }

    pub async fn get(&self, id: &str) -> Result<Option<ScheduledTask>, ServerError> {
        let id = id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM schedules WHERE id = ?1",
                    COLUMNS
                ))?;
                stmt.query_row(rusqlite::params![id], |row| Ok(row_to_task(row)))
                    .optional()
            })
            .await
    }

    /// List tasks, optionally filtered by agent and/or owner, newest first.
    pub async fn list(
        &self,
        agent_id: Option<&str>,
        owner: Option<&str>,
    ) -> Result<Vec<ScheduledTask>, ServerError> {
        let agent_id = agent_id.map(|s| s.to_string());
        let owner = owner.map(|s| s.to_string());
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM schedules ORDER BY created_at DESC",
                    COLUMNS
                ))?;
                let rows = stmt
                    .query_map([], |row| Ok(row_to_task(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows
                    .into_iter()
                    .filter(|t| agent_id.as_deref().is_none_or(|a| t.agent_id == a))
                    .filter(|t| owner.as_deref().is_none_or(|o| t.owner == o))
                    .collect())
            })
            .await
    }

    /// Delete a task, checking ownership. Returns false when the task does
    /// not exist or belongs to someone else.
    pub async fn delete(&self, id: &str, owner: &str) -> Result<bool, ServerError> {
        let id = id.to_string();
        let owner = owner.to_string();
        self.db
            .with_conn_async(move |conn| {
                let changed = conn.execute(
                    "DELETE FROM schedules WHERE id = ?1 AND owner = ?2",
                    rusqlite::params![id, owner],
                )?;
                Ok(changed > 0)
            })
            .await
    }
}

const COLUMNS: &str = "id, task_name, task_type, schedule_kind, schedule_params, \
                       task_params, agent_id, owner, status, run_count, \
                       last_run_at, next_run_at, created_at";

fn row_to_task(row: &rusqlite::Row<'_>) -> ScheduledTask {
    let schedule_params: String = row.get(4).unwrap_or_default();
    let task_params: String = row.get(5).unwrap_or_default();
    let last_run_ms: Option<i64> = row.get(10).unwrap_or(None);
    let next_run_ms: Option<i64> = row.get(11).unwrap_or(None);
    let created_ms: i64 = row.get(12).unwrap_or(0);

    ScheduledTask {
        id: row.get(0).unwrap_or_default(),
        task_name: row.get(1).unwrap_or_default(),
        task_type: row.get(2).unwrap_or_default(),
        schedule_kind: row.get(3).unwrap_or_default(),
        schedule_params: serde_json::from_str(&schedule_params)
            .unwrap_or(serde_json::Value::Null),
        task_params: serde_json::from_str(&task_params).unwrap_or(serde_json::Value::Null),
        agent_id: row.get(6).unwrap_or_default(),
        owner: row.get(7).unwrap_or_default(),
        status: row.get(8).unwrap_or_default(),
        run_count: row.get(9).unwrap_or(0),
        last_run_at: last_run_ms.and_then(DateTime::from_timestamp_millis),
        next_run_at: next_run_ms.and_then(DateTime::from_timestamp_millis),
        created_at: DateTime::from_timestamp_millis(created_ms).unwrap_or_else(Utc::now),
    }
}
