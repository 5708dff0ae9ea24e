use thiserror::Error;

/// A convenience `Result` alias using [`AquilaError`].
pub type AquilaResult<T> = Result<T, AquilaError>;

/// Top-level error type for the Aquila framework.
///
/// Each variant corresponds to a subsystem or a caller mistake that can be
/// reported synchronously. Failures of individual tasks are never surfaced
/// through this type; they are recorded on the task itself.
#[derive(Error, Debug)]
pub enum AquilaError {
    /// An error raised by an agent (initialisation or processing).
    #[error("Agent error: {0}")]
    Agent(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error from the task orchestrator.
    #[error("Orchestrator error: {0}")]
    Orchestrator(String),

    /// A task with this id was already scheduled.
    #[error("Task with ID {0} already exists")]
    DuplicateTaskId(String),

    /// An agent with this id is already registered.
    #[error("Agent with ID {0} is already registered")]
    DuplicateAgent(String),

    /// No agent is registered under this id.
    #[error("Agent {0} not found")]
    AgentNotFound(String),

    /// An agent execution failed.
    #[error("Execution error: {0}")]
    Execution(String),

    /// An operation did not settle in time.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
