//! Parsers for tmux's formatted command output.

use crate::commands::FIELD_SEP;

/// One line of `list-sessions` output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TmuxSessionInfo {
    /// Session name
    pub name: String,
    /// Number of clients attached
    pub attached: u32,
    /// Creation time, seconds since the epoch
    pub created: u64,
}

impl TmuxSessionInfo {
    pub fn is_attached(&self) -> bool {
        self.attached > 0
    }
}

/// Parse the output of [`TmuxCommand::list_sessions`](crate::TmuxCommand::list_sessions).
///
/// Malformed lines are skipped.
pub fn parse_list_sessions(output: &str) -> Vec<TmuxSessionInfo> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let mut fields = line.split(FIELD_SEP);
            let name = fields.next()?.to_string();
            let attached = fields.next().and_then(|f| f.trim().parse().ok());
            let created = fields.next().and_then(|f| f.trim().parse().ok());
            match (attached, created) {
                (Some(attached), Some(created)) if !name.is_empty() => Some(TmuxSessionInfo {
                    name,
                    attached,
                    created,
                }),
                _ => {
                    log::debug!("Skipping malformed list-sessions line: {:?}", line);
                    None
                }
            }
        })
        .collect()
}

/// Parse the output of [`TmuxCommand::pane_pid`](crate::TmuxCommand::pane_pid).
pub fn parse_pane_pid(output: &str) -> Option<u32> {
    output.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_sessions() {
        let out = "termdeck-a\t1\t1700000000\ntermdeck-b\t0\t1700000100\n";
        let sessions = parse_list_sessions(out);
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].name, "termdeck-a");
        assert!(sessions[0].is_attached());
        assert!(!sessions[1].is_attached());
        assert_eq!(sessions[1].created, 1_700_000_100);
    }

    #[test]
    fn test_parse_list_sessions_skips_garbage() {
        let out = "no server running on /tmp/tmux-1000/default\n\nok\t0\t5\n";
        let sessions = parse_list_sessions(out);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].name, "ok");
    }

    #[test]
    fn test_parse_pane_pid() {
        assert_eq!(parse_pane_pid("4242\n"), Some(4242));
        assert_eq!(parse_pane_pid("can't find session"), None);
    }
}
