use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("network error: {0}")]
    Network(String),

    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed upstream response: {0}")]
    Malformed(String),

    #[error("smtp error: {0}")]
    Smtp(String),

    #[error("timed out: {0}")]
    Timeout(String),
}

impl AdapterError {
    /// The upstream answered that the requested resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AdapterError::Status { status: 404, .. })
    }
}

pub type Result<T> = std::result::Result<T, AdapterError>;
