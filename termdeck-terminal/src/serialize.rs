//! Plain-text serialization of a headless terminal.
//!
//! vt100 only exposes rows through the visible window, so history is read by
//! stepping the scrollback offset from the oldest line towards the live
//! screen one page at a time, then restoring the caller's offset.

use super::HeadlessTerminal;

impl HeadlessTerminal {
    /// Number of lines currently held in history.
    pub fn scrollback_len(&mut self) -> usize {
        let Some(parser) = self.parser.as_mut() else {
            return 0;
        };
        let saved = parser.screen().scrollback();
        parser.screen_mut().set_scrollback(usize::MAX);
        let total = parser.screen().scrollback();
        parser.screen_mut().set_scrollback(saved);
        total
    }

    /// Serialize history followed by the visible screen as plain text.
    ///
    /// Trailing whitespace is stripped from every line and trailing blank
    /// lines are dropped. Returns an empty string once disposed.
    pub fn serialize(&mut self) -> String {
        let Some(parser) = self.parser.as_mut() else {
            return String::new();
        };

        let (rows, cols) = parser.screen().size();
        let saved = parser.screen().scrollback();

        parser.screen_mut().set_scrollback(usize::MAX);
        let total = parser.screen().scrollback();

        let mut lines: Vec<String> = Vec::with_capacity(total + rows as usize);
        let mut offset = total;
        while offset > 0 {
            parser.screen_mut().set_scrollback(offset);
            let take = offset.min(rows as usize);
            lines.extend(parser.screen().rows(0, cols).take(take));
            offset -= take;
        }

        parser.screen_mut().set_scrollback(0);
        lines.extend(parser.screen().rows(0, cols));
        parser.screen_mut().set_scrollback(saved);

        for line in lines.iter_mut() {
            let trimmed = line.trim_end().len();
            line.truncate(trimmed);
        }
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }

        lines.join("\n")
    }
}
