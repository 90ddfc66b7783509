//! Core `Config` struct definition.
//!
//! Fields are grouped into sub-structs using `#[serde(flatten)]` where the
//! YAML should stay flat (`TmuxConfig`), and nested where a whole section is
//! optional (`RemoteConfig`).

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Settings controlling how local sessions map onto tmux.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TmuxConfig {
    /// Path to tmux executable (default: "tmux" - uses PATH)
    #[serde(default = "crate::defaults::tmux_path")]
    pub tmux_path: String,

    /// Prefix for tmux session names owned by termdeck.
    /// Sessions are named `<prefix>-<pane id>`; anything else is ignored
    /// by recovery and orphan cleanup.
    #[serde(default = "crate::defaults::session_prefix")]
    pub tmux_session_prefix: String,

    /// Kill prefixed tmux sessions that no persisted tab refers to at startup
    #[serde(default = "crate::defaults::bool_true")]
    pub kill_orphan_sessions: bool,
}

impl Default for TmuxConfig {
    fn default() -> Self {
        Self {
            tmux_path: crate::defaults::tmux_path(),
            tmux_session_prefix: crate::defaults::session_prefix(),
            kill_orphan_sessions: crate::defaults::bool_true(),
        }
    }
}

/// Remote (polling) terminal backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the remote terminal API, e.g. `https://sandbox.example.com/api`
    pub base_url: String,

    /// Name of the environment variable holding the shared HMAC secret
    #[serde(default = "crate::defaults::remote_auth_secret_env")]
    pub auth_secret_env: String,

    /// Output polling cadence per pane
    #[serde(default = "crate::defaults::remote_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum age the server accepts for an internal token
    #[serde(default = "crate::defaults::remote_token_max_age_ms")]
    pub token_max_age_ms: u64,

    /// Per-request timeout
    #[serde(default = "crate::defaults::remote_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_secret_env: crate::defaults::remote_auth_secret_env(),
            poll_interval_ms: crate::defaults::remote_poll_interval_ms(),
            token_max_age_ms: crate::defaults::remote_token_max_age_ms(),
            request_timeout_secs: crate::defaults::remote_request_timeout_secs(),
        }
    }
}

/// A named command launched by the preset chord (`<trigger>` then `1`-`9`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalPreset {
    pub name: String,

    /// Command line to run instead of the login shell
    #[serde(default)]
    pub command: Option<String>,

    /// Working directory; `~/` is expanded
    #[serde(default)]
    pub cwd: Option<String>,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    // ========================================================================
    // Geometry & scrollback
    // ========================================================================
    /// Columns used when a create request carries no geometry
    #[serde(default = "crate::defaults::cols")]
    pub default_cols: u16,

    /// Rows used when a create request carries no geometry
    #[serde(default = "crate::defaults::rows")]
    pub default_rows: u16,

    /// Lines of history kept by each session's headless terminal
    #[serde(default = "crate::defaults::scrollback_lines")]
    pub scrollback_lines: usize,

    // ========================================================================
    // Output batching
    // ========================================================================
    /// Flush interval of the per-pane output batcher
    #[serde(default = "crate::defaults::output_batch_interval_ms")]
    pub output_batch_interval_ms: u64,

    /// Flush immediately once this many bytes are buffered
    #[serde(default = "crate::defaults::output_batch_max_bytes")]
    pub output_batch_max_bytes: usize,

    // ========================================================================
    // Processes
    // ========================================================================
    /// Shell started inside new sessions (default: `$SHELL`)
    #[serde(default)]
    pub shell: Option<String>,

    #[serde(flatten)]
    pub tmux: TmuxConfig,

    /// Remote polling backend; absent means only local sessions are available
    #[serde(default)]
    pub remote: Option<RemoteConfig>,

    // ========================================================================
    // IPC & state
    // ========================================================================
    /// Unix socket the IPC bridge listens on (default: runtime dir)
    #[serde(default)]
    pub socket_path: Option<String>,

    /// Directory holding persisted tab state (default: config dir `state/`)
    #[serde(default)]
    pub state_dir: Option<String>,

    // ========================================================================
    // Shortcuts
    // ========================================================================
    /// How long the preset chord waits for a digit before opening the default
    #[serde(default = "crate::defaults::chord_timeout_ms")]
    pub chord_timeout_ms: u64,

    /// Presets addressed by the chord digits, in order
    #[serde(default)]
    pub presets: Vec<TerminalPreset>,

    // ========================================================================
    // Debug Logging
    // ========================================================================
    /// Log level: off, error, warn, info, debug, trace
    #[serde(default = "crate::defaults::log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_cols: crate::defaults::cols(),
            default_rows: crate::defaults::rows(),
            scrollback_lines: crate::defaults::scrollback_lines(),
            output_batch_interval_ms: crate::defaults::output_batch_interval_ms(),
            output_batch_max_bytes: crate::defaults::output_batch_max_bytes(),
            shell: None,
            tmux: TmuxConfig::default(),
            remote: None,
            socket_path: None,
            state_dir: None,
            chord_timeout_ms: crate::defaults::chord_timeout_ms(),
            presets: Vec::new(),
            log_level: crate::defaults::log_level(),
        }
    }
}

impl Config {
    /// Check values that deserialize fine but would break the session core.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_cols == 0 || self.default_rows == 0 {
            return Err(ConfigError::Validation(format!(
                "default geometry must be positive, got {}x{}",
                self.default_cols, self.default_rows
            )));
        }
        if self.output_batch_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "output_batch_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.tmux.tmux_session_prefix.is_empty()
            || self.tmux.tmux_session_prefix.contains([':', '.'])
        {
            return Err(ConfigError::Validation(format!(
                "tmux_session_prefix '{}' must be non-empty and free of ':' and '.'",
                self.tmux.tmux_session_prefix
            )));
        }
        if let Some(remote) = &self.remote {
            if remote.base_url.is_empty() {
                return Err(ConfigError::Validation(
                    "remote.base_url must not be empty".to_string(),
                ));
            }
            if remote.poll_interval_ms == 0 {
                return Err(ConfigError::Validation(
                    "remote.poll_interval_ms must be greater than 0".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Shell to launch in new local sessions.
    pub fn effective_shell(&self) -> String {
        self.shell
            .clone()
            .or_else(|| std::env::var("SHELL").ok())
            .unwrap_or_else(|| "/bin/sh".to_string())
    }

    /// Preset for a chord digit (`index` is zero-based).
    pub fn preset(&self, index: usize) -> Option<&TerminalPreset> {
        self.presets.get(index)
    }

    /// The preset opened when the chord times out.
    pub fn default_preset(&self) -> Option<&TerminalPreset> {
        self.presets.first()
    }
}
