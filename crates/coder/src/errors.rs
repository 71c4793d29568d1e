use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Could not find a match for edit:\n{0}")]
    NoMatchFound(String),

    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for AgentError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => AgentError::NotFound(err.to_string()),
            std::io::ErrorKind::PermissionDenied => AgentError::AccessDenied(err.to_string()),
            _ => AgentError::ExecutionError(err.to_string()),
        }
    }
}

pub type AgentResult<T> = Result<T, AgentError>;
