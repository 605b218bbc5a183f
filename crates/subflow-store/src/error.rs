//! Store error types.

use subflow_models::JobStatus;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Illegal transition: job {id} is {from}, cannot become {to}")]
    IllegalTransition {
        id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Job already exists: {0}")]
    AlreadyExists(String),

    #[error("Corrupt job document for {id}: {message}")]
    Corrupt { id: String, message: String },

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn corrupt(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            id: id.into(),
            message: message.into(),
        }
    }
}
