//! Errors reported by session backends.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend cannot serve this session (missing binary, no remote
    /// terminal provisioned, server unreachable).
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend does not implement this operation.
    #[error("{0} is not supported by this backend")]
    Unsupported(&'static str),

    /// An unknown signal name was requested.
    #[error("unknown signal: {0}")]
    UnknownSignal(String),

    #[error("failed to spawn session: {0}")]
    Spawn(String),

    #[error("http request failed: {0}")]
    Http(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BackendError {
    pub fn is_unsupported(&self) -> bool {
        matches!(self, BackendError::Unsupported(_))
    }
}
