//! Aviary Core — transport-agnostic domain logic for the Aviary agent
//! platform.
//!
//! This crate contains the data model, the workflow execution engine, tool
//! dispatch with its validators, the LLM client, and the SQLite stores. It
//! has **no HTTP framework dependency** by default, making it suitable for
//! use in:
//!
//! - HTTP servers (via `aviary-server`)
//! - CLI tools and schedulers
//! - Embedded test harnesses
//!
//! # Feature Flags
//!
//! - `axum` — Enables `IntoResponse` impl on `ServerError` for use in axum
//!   handlers.

pub mod db;
pub mod error;
pub mod llm;
pub mod models;
pub mod state;
pub mod store;
pub mod tools;
pub mod workflow;

// Convenience re-exports
pub use db::Database;
pub use error::{LlmError, ServerError, StepError, ToolError, WorkflowError};
pub use state::{AppState, AppStateInner};
