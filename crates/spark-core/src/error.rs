use thiserror::Error;

#[derive(Debug, Error)]
pub enum SparkError {
    #[error("not initialized: run 'spark init'")]
    NotInitialized,

    #[error("invalid team '{0}': expected team1..team4")]
    InvalidTeam(String),

    #[error("invalid phase: {0}")]
    InvalidPhase(String),

    #[error("invalid gate: {0}")]
    InvalidGate(String),

    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("no task found for {0}")]
    TaskNotFound(String),

    #[error("lock on '{path}' not held by {owner}")]
    LockNotHeld { path: String, owner: String },

    #[error("required tool not found: {0}")]
    ToolMissing(String),

    #[error("tool execution failed: {0}")]
    ToolFailed(String),

    #[error("malformed hook input: {0}")]
    MalformedInput(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, SparkError>;
