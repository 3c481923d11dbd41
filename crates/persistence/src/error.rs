//! Persistence errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for PersistenceError {
    fn from(err: tokio::task::JoinError) -> Self {
        PersistenceError::Task(err.to_string())
    }
}

impl From<PersistenceError> for docqa_core::Error {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Io(e) => docqa_core::Error::Io(e),
            PersistenceError::Serialization(e) => docqa_core::Error::Serialization(e),
            PersistenceError::Task(msg) => docqa_core::Error::InvalidInput(msg),
        }
    }
}
