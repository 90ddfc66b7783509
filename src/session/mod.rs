//! Terminal sessions keyed by pane id
//!
//! This module provides:
//! - `SessionManager`: Create, attach, resize, write, detach, kill and
//!   recover sessions on any registered backend
//! - `OutputBatcher`: UTF-8 aware batching of raw output
//! - `SessionEvent`: Output, exit and attention events pushed to the UI
//!
//! Each live session mirrors its output into a headless terminal so a
//! window that reattaches can be handed the serialized scrollback.

mod batcher;
mod error;
mod live;
mod manager;
mod pump;
mod recovery;
mod types;

pub use batcher::OutputBatcher;
pub use error::SessionError;
pub use manager::SessionManager;
pub use types::{
    CreateOrAttachParams, CreateOrAttachResult, KillSummary, RecoveryReport, ResizeOutcome,
    SessionEvent, SessionSettings,
};
