//! Errors returned by `SessionManager` operations.

use crate::backend::BackendError;
use termdeck_config::PaneId;
use thiserror::Error;

/// Cloneable so concurrent callers of one pending creation share the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no live session for pane {0}")]
    NotFound(PaneId),

    #[error("{operation} is not supported by this session's backend")]
    Unsupported { operation: &'static str },

    #[error("invalid geometry {cols}x{rows}")]
    InvalidGeometry { cols: u32, rows: u32 },

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("session manager is shutting down")]
    Closed,
}

impl From<BackendError> for SessionError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Unavailable(reason) => SessionError::Unavailable(reason),
            BackendError::Unsupported(operation) => SessionError::Unsupported { operation },
            other => SessionError::Backend(other.to_string()),
        }
    }
}
