use tasklane_adapters::AdapterError;
use tasklane_core::ValidationError;
use tasklane_db::DbError;
use tasklane_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("upstream error: {0}")]
    Upstream(#[from] AdapterError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// The message meant for API clients, without the kind prefix.
    pub fn message(&self) -> String {
        match self {
            ServiceError::NotFound(m)
            | ServiceError::InvalidInput(m)
            | ServiceError::Conflict(m)
            | ServiceError::Unauthorized(m)
            | ServiceError::Unavailable(m)
            | ServiceError::Internal(m) => m.clone(),
            ServiceError::Upstream(AdapterError::Status { message, .. }) => message.clone(),
            ServiceError::Upstream(e) => e.to_string(),
        }
    }
}

impl From<DbError> for ServiceError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(msg) => ServiceError::NotFound(msg),
            DbError::Conflict(msg) => ServiceError::Conflict(msg),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(key) => ServiceError::NotFound(format!("File not found: {key}")),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(e: ValidationError) -> Self {
        ServiceError::InvalidInput(e.0)
    }
}
