//! tmux command builders
//!
//! Type-safe builders for the tmux invocations used by the local backend.
//! Commands are kept as argv vectors so they can be handed to a PTY
//! `CommandBuilder` or `std::process::Command` without shell quoting.

/// Field separator used in `-F` formats
pub const FIELD_SEP: char = '\t';

/// A tmux command ready to be executed (arguments only, no binary)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TmuxCommand {
    args: Vec<String>,
}

impl TmuxCommand {
    fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Arguments to pass after the tmux binary
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Run `other` in the same tmux invocation (`cmd ; other`)
    pub fn then(mut self, other: TmuxCommand) -> Self {
        self.args.push(";".to_string());
        self.args.extend(other.args);
        self
    }

    /// Human-readable form for logs
    pub fn display(&self) -> String {
        self.args.join(" ")
    }

    // =========================================================================
    // Session Commands
    // =========================================================================

    /// Create the session or attach to it if it already exists.
    ///
    /// `cwd` and `command` only apply when the session is created.
    pub fn new_session_or_attach(
        name: &str,
        cols: u16,
        rows: u16,
        cwd: Option<&str>,
        command: Option<&str>,
    ) -> Self {
        let mut args = vec![
            "new-session".to_string(),
            "-A".to_string(),
            "-s".to_string(),
            name.to_string(),
            "-x".to_string(),
            cols.to_string(),
            "-y".to_string(),
            rows.to_string(),
        ];
        if let Some(dir) = cwd {
            args.push("-c".to_string());
            args.push(dir.to_string());
        }
        if let Some(cmd) = command {
            args.push(cmd.to_string());
        }
        Self::new(args)
    }

    /// Exit status 0 when the session exists
    pub fn has_session(name: &str) -> Self {
        Self::new(["has-session", "-t", exact(name).as_str()])
    }

    /// Kill a session
    pub fn kill_session(name: &str) -> Self {
        Self::new(["kill-session", "-t", exact(name).as_str()])
    }

    /// List all sessions as `name\tattached\tcreated`
    pub fn list_sessions() -> Self {
        Self::new([
            "list-sessions".to_string(),
            "-F".to_string(),
            format!("#{{session_name}}{FIELD_SEP}#{{session_attached}}{FIELD_SEP}#{{session_created}}"),
        ])
    }

    /// Hide the status line so the pane fills the client
    pub fn hide_status(name: &str) -> Self {
        Self::new(["set-option", "-t", exact(name).as_str(), "status", "off"])
    }

    // =========================================================================
    // Pane Commands
    // =========================================================================

    /// Capture pane contents. `history` limits how many lines above the
    /// visible area are included; `None` captures the whole history.
    pub fn capture_pane(name: &str, history: Option<usize>) -> Self {
        let start = match history {
            Some(lines) => format!("-{lines}"),
            None => "-".to_string(),
        };
        Self::new([
            "capture-pane".to_string(),
            "-p".to_string(),
            "-J".to_string(),
            "-t".to_string(),
            exact(name),
            "-S".to_string(),
            start,
        ])
    }

    /// Print the PID of the session's active pane
    pub fn pane_pid(name: &str) -> Self {
        Self::new(["display-message", "-p", "-t", exact(name).as_str(), "#{pane_pid}"])
    }

    /// Resize the session's window
    pub fn resize_window(name: &str, cols: u16, rows: u16) -> Self {
        Self::new([
            "resize-window".to_string(),
            "-t".to_string(),
            exact(name),
            "-x".to_string(),
            cols.to_string(),
            "-y".to_string(),
            rows.to_string(),
        ])
    }
}

/// Exact-match target (`=name`) so `term-1` never matches `term-10`
fn exact(name: &str) -> String {
    format!("={name}")
}
