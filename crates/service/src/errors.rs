use std::fmt::Display;

use models::errors::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
}

impl ServiceError {
    pub fn not_found(entity: &str) -> Self { Self::NotFound(format!("{} not found", entity)) }

    pub fn persistence(context: &str, err: impl Display) -> Self {
        Self::PersistenceFailure(format!("{context}: {err}"))
    }

    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            ServiceError::InvalidInput(_) => 1001,
            ServiceError::Conflict(_) => 1002,
            ServiceError::NotFound(_) => 1003,
            ServiceError::PersistenceFailure(_) => 1200,
        }
    }

    /// Only storage failures may succeed on a later attempt; the rest are
    /// deterministic outcomes of the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::PersistenceFailure(_))
    }
}

impl From<ModelError> for ServiceError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Validation(msg) => ServiceError::InvalidInput(msg),
        }
    }
}
