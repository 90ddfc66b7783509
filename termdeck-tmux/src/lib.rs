//! tmux integration for termdeck local sessions.
//!
//! Each pane is backed by one detached tmux session named
//! `<prefix>-<pane id>`. A PTY client runs `tmux new-session -A` so the
//! session is created on first use and simply reattached after a restart.
//!
//! This crate provides:
//! - [`TmuxCommand`] argv builders for every tmux invocation the backend makes
//! - [`SessionNaming`] for the pane-id ↔ session-name mapping
//! - [`parse_list_sessions`] and friends for tmux's formatted output

pub mod commands;
pub mod naming;
pub mod parse;

pub use commands::TmuxCommand;
pub use naming::SessionNaming;
pub use parse::{TmuxSessionInfo, parse_list_sessions, parse_pane_pid};
