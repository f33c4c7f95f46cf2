//! Agent definition persistence.
//!
//! Definitions are stored as their canonical JSON, keyed by owner and agent
//! id — the store is the snapshot provider the engine runs against; the
//! engine itself never writes back.

use chrono::Utc;
use rusqlite::OptionalExtension;

use crate::db::Database;
use crate::error::ServerError;
use crate::models::AgentDefinition;

#[derive(Clone)]
pub struct AgentStore {
    db: Database,
}

impl AgentStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn save(&self, agent: &AgentDefinition) -> Result<(), ServerError> {
        let definition = serde_json::to_string(agent)
            .map_err(|e| ServerError::Internal(format!("Failed to serialize agent: {}", e)))?;
        let agent_id = agent.agent_id.clone();
        let owner = agent.owner.clone();
        let now = Utc::now().timestamp_millis();

        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO agents (agent_id, owner, definition, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)
                     ON CONFLICT(owner, agent_id) DO UPDATE SET
                       definition = excluded.definition,
                       updated_at = excluded.updated_at",
                    rusqlite::params![agent_id, owner, definition, now],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get(
        &self,
        owner: &str,
        agent_id: &str,
    ) -> Result<Option<AgentDefinition>, ServerError> {
        let owner = owner.to_string();
        let id = agent_id.to_string();
        let row: Option<String> = self
            .db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT definition FROM agents WHERE owner = ?1 AND agent_id = ?2",
                )?;
                stmt.query_row(rusqlite::params![owner, id], |row| row.get(0))
                    .optional()
            })
            .await?;

        row.map(|json| {
            serde_json::from_str(&json)
                .map_err(|e| ServerError::Internal(format!("Corrupt agent definition: {}", e)))
        })
        .transpose()
    }

    pub async fn list_by_owner(&self, owner: &str) -> Result<Vec<AgentDefinition>, ServerError> {
        let owner = owner.to_string();
        let rows: Vec<String> = self
            .db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT definition FROM agents WHERE owner = ?1 ORDER BY created_at DESC",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![owner], |row| row.get(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        let mut agents = Vec::with_capacity(rows.len());
        for json in rows {
            match serde_json::from_str(&json) {
                Ok(agent) => agents.push(agent),
                Err(e) => tracing::warn!("Skipping corrupt agent definition: {}", e),
            }
        }
        Ok(agents)
    }

    pub async fn delete(&self, owner: &str, agent_id: &str) -> Result<bool, ServerError> {
        let owner = owner.to_string();
        let id = agent_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let changed = conn.execute(
                    "DELETE FROM agents WHERE owner = ?1 AND agent_id = ?2",
                    rusqlite::params![owner, id],
                )?;
                Ok(changed > 0)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataSchema, LlmConfig};

    fn sample_agent(owner: &str, agent_id: &str) -> AgentDefinition {
        AgentDefinition {
            owner: owner.to_string(),
            agent_id: agent_id.to_string(),
            agent_name: "Sample".to_string(),
            version: "1.0".to_string(),
            system_prompt: "prompt".to_string(),
            llm_config: LlmConfig::default(),
            data_schema: DataSchema {
                collection_name: "sample_data".to_string(),
                schema_definition: serde_json::json!({}),
            },
            tools: Vec::new(),
            workflows: Vec::new(),
            schedules: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_save_get_roundtrip() {
        let store = AgentStore::new(Database::open_in_memory().unwrap());
        store.save(&sample_agent("alice", "a1")).await.unwrap();

        let loaded = store.get("alice", "a1").await.unwrap().unwrap();
        assert_eq!(loaded.agent_name, "Sample");
        assert!(store.get("bob", "a1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites_existing() {
        let store = AgentStore::new(Database::open_in_memory().unwrap());
        let mut agent = sample_agent("alice", "a1");
        store.save(&agent).await.unwrap();

        agent.agent_name = "Renamed".to_string();
        store.save(&agent).await.unwrap();

        let loaded = store.get("alice", "a1").await.unwrap().unwrap();
        assert_eq!(loaded.agent_name, "Renamed");
        assert_eq!(store.list_by_owner("alice").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let store = AgentStore::new(Database::open_in_memory().unwrap());
        store.save(&sample_agent("alice", "a1")).await.unwrap();
        store.save(&sample_agent("alice", "a2")).await.unwrap();
        store.save(&sample_agent("bob", "b1")).await.unwrap();

        assert_eq!(store.list_by_owner("alice").await.unwrap().len(), 2);
        assert!(store.delete("alice", "a1").await.unwrap());
        assert!(!store.delete("alice", "a1").await.unwrap());
        assert_eq!(store.list_by_owner("alice").await.unwrap().len(), 1);
    }
}
