//! Shared application state.
//!
//! The tool registry, the LLM client, and the open database are owned here
//! and injected — never process-wide globals — so multiple instances or
//! test runs don't share hidden state.

use std::sync::Arc;

use crate::db::Database;
use crate::llm::{HttpLlmClient, LlmClient};
use crate::models::AgentDefinition;
use crate::store::{AgentStore, DataStore, ScheduleStore};
use crate::tools::ToolRegistry;
use crate::workflow::WorkflowExecutor;

/// Shared state accessible by all API handlers and the scheduler.
pub struct AppStateInner {
    pub db: Database,
    pub agent_store: AgentStore,
    pub data_store: DataStore,
    pub schedule_store: ScheduleStore,
    pub tools: Arc<ToolRegistry>,
    pub llm: Arc<dyn LlmClient>,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    pub fn new(db: Database) -> Self {
        Self::with_llm(db, Arc::new(HttpLlmClient::new()))
    }

    /// Build state with a custom LLM client (used by tests).
    pub fn with_llm(db: Database, llm: Arc<dyn LlmClient>) -> Self {
        let data_store = DataStore::new(db.clone());
        let schedule_store = ScheduleStore::new(db.clone());
        let tools = Arc::new(ToolRegistry::with_defaults(
            data_store.clone(),
            schedule_store.clone(),
        ));
        Self {
            agent_store: AgentStore::new(db.clone()),
            data_store,
            schedule_store,
            tools,
            llm,
            db,
        }
    }

    /// Build a workflow executor for one run against the given agent
    /// snapshot. Each run owns its own context and log.
    pub fn executor_for(&self, agent: AgentDefinition) -> WorkflowExecutor {
        WorkflowExecutor::new(
            agent,
            self.tools.clone(),
            self.llm.clone(),
            self.data_store.clone(),
        )
    }
}
