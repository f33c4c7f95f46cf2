//! Error types for the Aviary platform.
//!
//! Two layers live here. `ServerError` is the store/transport-facing type
//! used by the persistence layer and the HTTP adapter (with an optional
//! axum `IntoResponse` impl behind the `axum` feature). The remaining
//! types form the domain taxonomy of tool dispatch and workflow execution:
//! validation and security failures are terminal for a step and never
//! retried, execution failures are retryable, step failures are routed
//! through the step's declared failure policy, and run-level failures are
//! always surfaced to the caller.

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure of one tool invocation, classified for retry policy.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    /// Malformed or unsafe input. Never retried.
    #[error("tool validation error: {0}")]
    Validation(String),

    /// Policy violation (disallowed type, dangerous URL, bad credentials).
    /// Never retried.
    #[error("tool security error: {0}")]
    Security(String),

    /// Transient or terminal execution failure (network, timeout, remote
    /// error). Retried with backoff up to the step's attempt budget.
    #[error("tool execution error: {0}")]
    Execution(String),
}

impl ToolError {
    /// Whether the dispatch/retry layer may re-attempt after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ToolError::Execution(_))
    }
}

/// Failure of the LLM completion collaborator.
///
/// Transport-level failures are recoverable (the engine's retry wrapper
/// re-attempts them); an unconfigured provider is terminal.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("LLM provider '{0}' is not configured or the API key is missing")]
    ProviderNotConfigured(String),

    #[error("LLM request failed: {0}")]
    Request(String),
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Request(_))
    }
}

/// A failure local to one workflow step, before failure policy is applied.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("variable '{0}' is not defined in the execution context")]
    MissingVariable(String),

    #[error("tool '{0}' not found in agent configuration")]
    UnknownTool(String),

    #[error("unsupported data store action: {0}")]
    UnsupportedAction(String),

    #[error("invalid condition '{condition}': {reason}")]
    InvalidCondition { condition: String, reason: String },

    #[error("data store error: {0}")]
    Store(String),
}

impl StepError {
    /// Only transient tool/LLM failures are worth re-attempting; everything
    /// else (missing variables, unknown tools, policy violations) will fail
    /// identically on every attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            StepError::Tool(e) => e.is_retryable(),
            StepError::Llm(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Run-level failure of a workflow execution. Always surfaced to the
/// caller; the engine never swallows these.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("workflow '{0}' not found in agent configuration")]
    WorkflowNotFound(String),

    #[error("invalid node id '{node_id}': must be an integer ordering key")]
    InvalidNodeId { node_id: String },

    #[error("step '{node_id}' failed: {source}")]
    Step {
        node_id: String,
        #[source]
        source: StepError,
    },
}

// ---------------------------------------------------------------------------
// axum integration (opt-in via feature flag)
// ---------------------------------------------------------------------------

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let (status, message) = match &self {
            ServerError::Database(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ServerError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}
