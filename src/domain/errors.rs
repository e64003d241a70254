use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    /// Store or relay could not be reached. Callers may re-invoke explicitly.
    #[error("Unavailable: {0}")]
    Unavailable(String),
    /// The remote capability answered but refused the request.
    #[error("Rejected: {0}")]
    Rejected(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for DomainError {
    fn from(e: serde_json::Error) -> Self {
        DomainError::Internal(format!("serialization: {e}"))
    }
}

impl From<tokio::task::JoinError> for DomainError {
    fn from(e: tokio::task::JoinError) -> Self {
        DomainError::Internal(format!("blocking task: {e}"))
    }
}
