//! Pluggable session backends
//!
//! A backend owns the real process behind a pane. The session manager only
//! talks to it through [`SessionBackend`] and [`BackendProcess`], and reads
//! raw output from the channel handed back by
//! [`SessionBackend::attach_or_create`].
//!
//! Sub-modules:
//! - [`local`]: tmux sessions attached through a local PTY.
//! - [`remote`]: Remote VM terminals read by polling an HTTP API.

mod error;
pub mod local;
pub mod remote;

pub use error::BackendError;

use async_trait::async_trait;
use serde::Serialize;
use termdeck_config::PaneId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Which operations a backend implements.
///
/// Callers check these before issuing an operation so an unsupported call
/// fails with an explicit error instead of silently doing nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendCapabilities {
    pub write: bool,
    pub remote_resize: bool,
    pub signal: bool,
    /// Sessions survive this process and can be reattached after a restart
    pub recoverable: bool,
}

/// Raw output of a backend process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOutput {
    Data(Vec<u8>),
    /// The session ended on its own. Sent at most once, last.
    Exit(Option<i32>),
}

/// Parameters for attaching to (or creating) a pane's session
#[derive(Debug, Clone)]
pub struct AttachRequest {
    pub pane_id: PaneId,
    pub cols: u16,
    pub rows: u16,
    pub cwd: Option<String>,
    /// Command line to run instead of the default shell
    pub command: Option<String>,
    /// Backend-specific target, e.g. a remote terminal id
    pub target: Option<String>,
    /// Cancelled by the session manager the moment the session dies; any
    /// reader or poller must stop once it fires
    pub cancel: CancellationToken,
}

/// A live attachment produced by a backend
pub struct Attached {
    pub process: Box<dyn BackendProcess>,
    pub output: mpsc::UnboundedReceiver<BackendOutput>,
    /// The session already existed before this attach
    pub was_recovered: bool,
    /// Group the backend itself files the session under, used when the
    /// caller gives none
    pub group_key: Option<String>,
}

/// A session known to a backend, attached or not
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSessionInfo {
    /// Backend-native name of the session
    pub key: String,
    /// Pane id decoded from `key`
    pub pane_id: PaneId,
    pub attached: bool,
}

/// Handle to one attached session
#[async_trait]
pub trait BackendProcess: Send + Sync {
    async fn write(&self, _data: &[u8]) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("write"))
    }

    async fn resize(&self, _cols: u16, _rows: u16) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("resize"))
    }

    async fn signal(&self, _signal: &str) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("signal"))
    }

    /// Terminate the underlying session
    async fn kill(&self) -> Result<(), BackendError>;

    /// Drop this attachment, leaving a persistent session running
    async fn release(&self) -> Result<(), BackendError>;
}

#[async_trait]
pub trait SessionBackend: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> BackendCapabilities;

    async fn attach_or_create(&self, request: AttachRequest) -> Result<Attached, BackendError>;

    /// Sessions this backend owns, whether or not they are attached
    async fn list_sessions(&self) -> Result<Vec<BackendSessionInfo>, BackendError>;

    /// Backend-native key of the session that would host `pane_id`
    fn session_key(&self, pane_id: &str) -> String;

    /// Kill a session that is not attached in this process
    async fn kill_session(&self, info: &BackendSessionInfo) -> Result<(), BackendError>;

    /// Scrollback of a session that is not attached in this process
    async fn history(&self, _pane_id: &str) -> Result<Option<String>, BackendError> {
        Ok(None)
    }
}
