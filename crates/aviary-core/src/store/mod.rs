//! Persistence stores, one per aggregate, all backed by the shared
//! `Database` handle.

pub mod agent_store;
pub mod data_store;
pub mod schedule_store;

pub use agent_store::AgentStore;
pub use data_store::DataStore;
pub use schedule_store::{CreateTaskInput, ScheduleStore, ScheduledTask};
