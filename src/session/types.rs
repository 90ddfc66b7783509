//! Parameters, results and events of the session manager.

use crate::backend::local::LOCAL_BACKEND;
use serde::Serialize;
use std::time::Duration;
use termdeck_config::{Config, PaneId, defaults};

/// Tunables taken from [`Config`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub default_cols: u16,
    pub default_rows: u16,
    pub scrollback_lines: usize,
    pub batch_interval: Duration,
    pub batch_max_bytes: usize,
    pub kill_orphan_sessions: bool,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_cols: config.default_cols,
            default_rows: config.default_rows,
            scrollback_lines: config.scrollback_lines,
            batch_interval: Duration::from_millis(config.output_batch_interval_ms),
            batch_max_bytes: config.output_batch_max_bytes,
            kill_orphan_sessions: config.tmux.kill_orphan_sessions,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            default_cols: defaults::cols(),
            default_rows: defaults::rows(),
            scrollback_lines: defaults::scrollback_lines(),
            batch_interval: Duration::from_millis(defaults::output_batch_interval_ms()),
            batch_max_bytes: defaults::output_batch_max_bytes(),
            kill_orphan_sessions: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOrAttachParams {
    pub pane_id: PaneId,
    /// Registered backend name
    pub backend: String,
    pub cols: Option<u16>,
    pub rows: Option<u16>,
    pub cwd: Option<String>,
    pub command: Option<String>,
    /// Backend-specific target, e.g. a remote terminal id
    pub target: Option<String>,
    /// Sessions sharing a key can be killed together
    pub group_key: Option<String>,
}

impl CreateOrAttachParams {
    /// Local session with default geometry
    pub fn new(pane_id: impl Into<PaneId>) -> Self {
        Self {
            pane_id: pane_id.into(),
            backend: LOCAL_BACKEND.to_string(),
            cols: None,
            rows: None,
            cwd: None,
            command: None,
            target: None,
            group_key: None,
        }
    }

    pub fn backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    pub fn size(mut self, cols: u16, rows: u16) -> Self {
        self.cols = Some(cols);
        self.rows = Some(rows);
        self
    }

    pub fn group_key(mut self, key: impl Into<String>) -> Self {
        self.group_key = Some(key.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrAttachResult {
    pub is_new: bool,
    /// Serialized history of an existing session, empty for new ones
    pub scrollback: String,
    pub was_recovered: bool,
    /// Viewport recorded by the last detach
    pub viewport_y: Option<u32>,
}

/// Events pushed to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Data { pane_id: PaneId, data: String },
    Exit { pane_id: PaneId, code: Option<i32> },
    /// The session rang the terminal bell
    Attention { pane_id: PaneId },
}

impl SessionEvent {
    pub fn pane_id(&self) -> &str {
        match self {
            SessionEvent::Data { pane_id, .. }
            | SessionEvent::Exit { pane_id, .. }
            | SessionEvent::Attention { pane_id } => pane_id,
        }
    }
}

/// What a resize request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeOutcome {
    /// The mirror and the backend process were resized
    Applied,
    /// Only the local mirror was resized; the backend can't follow
    MirrorOnly,
    /// Invalid geometry or no live session; nothing changed
    Ignored,
}

impl ResizeOutcome {
    pub fn is_applied(self) -> bool {
        self == ResizeOutcome::Applied
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KillSummary {
    pub killed: usize,
    pub failed: usize,
}

/// Outcome of startup reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryReport {
    pub reattached: Vec<PaneId>,
    pub orphans_killed: Vec<String>,
    pub orphans_kept: Vec<String>,
    pub failed: Vec<String>,
}
