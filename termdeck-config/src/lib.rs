//! Configuration system for termdeck.
//!
//! This crate provides configuration loading, saving, and default values
//! for the session core. It includes:
//!
//! - The [`Config`] struct with its tmux and remote-backend sections
//! - `default_*` value functions used by serde
//! - YAML persistence with atomic writes and XDG path resolution
//! - Typed [`ConfigError`] variants for callers that match on failures

pub mod config;
pub mod defaults;
pub mod error;
mod persistence;

pub use config::{Config, RemoteConfig, TerminalPreset, TmuxConfig};
pub use error::ConfigError;

/// Identifier of a tab (also used as the pane id of a leaf tab).
pub type TabId = String;

/// Identifier of a workspace (one UI surface).
pub type WorkspaceId = String;

/// Identifier of a pane; a session is keyed by this.
pub type PaneId = String;
