use thiserror::Error;

use crate::storage::StorageError;

/// Error taxonomy for the orchestration engines.
///
/// `Validation`, `NotFound` and `Conflict` surface to the caller and are never
/// retried. `Transient` covers storage unavailability and outbound timeouts and
/// is retried with bounded backoff where the call site allows it. `External`
/// is a definitive 4xx-style failure from a collaborator. `InvalidToken`
/// deliberately carries no detail; candidates see a single generic message.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("transient failure: {0}")]
    Transient(#[source] anyhow::Error),

    #[error("external service error: {0}")]
    External(String),

    #[error("link invalid or expired")]
    InvalidToken,
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// True for failures worth a bounded retry
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => Self::NotFound(what),
            StorageError::Conflict(msg) => Self::Conflict(msg),
            StorageError::Transient(source) => Self::Transient(source),
        }
    }
}
