use thiserror::Error;

/// Input rejected before it reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);
