//! Default value functions for configuration.
//!
//! Each function is used as a `#[serde(default = "crate::defaults::...")]`
//! attribute on a `Config` field and by the matching `Default` impl.

// ── Geometry & scrollback ──────────────────────────────────────────────────

pub fn cols() -> u16 {
    80
}

pub fn rows() -> u16 {
    24
}

pub fn scrollback_lines() -> usize {
    5000
}

// ── Output batching ────────────────────────────────────────────────────────

pub fn output_batch_interval_ms() -> u64 {
    16 // One frame at 60 Hz
}

pub fn output_batch_max_bytes() -> usize {
    64 * 1024
}

// ── Remote polling ─────────────────────────────────────────────────────────

pub fn remote_poll_interval_ms() -> u64 {
    1000
}

pub fn remote_auth_secret_env() -> String {
    "TERMDECK_INTERNAL_SECRET".to_string()
}

pub fn remote_token_max_age_ms() -> u64 {
    5 * 60 * 1000
}

pub fn remote_request_timeout_secs() -> u64 {
    10
}

// ── tmux ───────────────────────────────────────────────────────────────────

pub fn tmux_path() -> String {
    "tmux".to_string()
}

pub fn session_prefix() -> String {
    "termdeck".to_string()
}

// ── Shortcuts ──────────────────────────────────────────────────────────────

pub fn chord_timeout_ms() -> u64 {
    1500
}

// ── Misc ───────────────────────────────────────────────────────────────────

pub fn log_level() -> String {
    "info".to_string()
}

pub fn bool_true() -> bool {
    true
}

pub fn bool_false() -> bool {
    false
}
