//! Mapping between termdeck pane ids and tmux session names.

use regex::Regex;
use std::sync::LazyLock;
use termdeck_config::PaneId;

/// Everything tmux might reject or read specially, plus the escape byte
static UNSAFE_CHARS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^A-Za-z0-9-]").expect("UNSAFE_CHARS_RE regex pattern is valid")
});

const ESCAPE: u8 = b'_';

/// Escape each unsafe character as `_XX` per UTF-8 byte
fn encode(pane_id: &str) -> String {
    UNSAFE_CHARS_RE
        .replace_all(pane_id, |caps: &regex::Captures<'_>| {
            caps[0]
                .bytes()
                .map(|b| format!("_{b:02X}"))
                .collect::<String>()
        })
        .into_owned()
}

/// Inverse of [`encode`]. `None` for names this scheme never produces.
fn decode(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == ESCAPE {
            let hex = name.get(i + 1..i + 3)?;
            if !hex.bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b)) {
                return None;
            }
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else if bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-' {
            out.push(bytes[i]);
            i += 1;
        } else {
            return None;
        }
    }
    String::from_utf8(out).ok()
}

/// Builds and recognises the session names owned by this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionNaming {
    prefix: String,
}

impl SessionNaming {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// tmux session name for a pane.
    ///
    /// tmux rejects `:` and `.` in names and treats a few other characters
    /// specially in targets. Anything outside `[A-Za-z0-9-]` is written as
    /// `_XX` hex per byte, so distinct pane ids never share a session.
    pub fn session_name(&self, pane_id: &str) -> String {
        format!("{}-{}", self.prefix, encode(pane_id))
    }

    /// Whether `session` was created by this naming scheme.
    pub fn owns(&self, session: &str) -> bool {
        session
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
            .is_some_and(|rest| !rest.is_empty())
    }

    /// Pane id encoded in an owned session name, exactly as it was given
    /// to [`session_name`](Self::session_name).
    pub fn pane_id(&self, session: &str) -> Option<PaneId> {
        if !self.owns(session) {
            return None;
        }
        decode(&session[self.prefix.len() + 1..])
    }
}
