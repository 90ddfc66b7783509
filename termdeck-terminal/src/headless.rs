//! `HeadlessTerminal`: a vt100 grid with bounded scrollback and no renderer.

/// Counts audible bells as the parser reports them. BEL bytes that end an
/// OSC sequence never reach this hook.
#[derive(Debug, Default, Clone, Copy)]
pub struct BellCounter {
    rung: u64,
}

impl vt100::Callbacks for BellCounter {
    fn audible_bell(&mut self, _: &mut vt100::Screen) {
        self.rung += 1;
    }
}

fn new_parser(rows: u16, cols: u16, scrollback_lines: usize) -> vt100::Parser<BellCounter> {
    vt100::Parser::new_with_callbacks(rows, cols, scrollback_lines, BellCounter::default())
}

/// Virtual terminal mirroring one session's output.
///
/// After [`dispose`](Self::dispose) the terminal ignores further input and
/// serializes to an empty string, so teardown races with late output are
/// harmless.
pub struct HeadlessTerminal {
    pub(crate) parser: Option<vt100::Parser<BellCounter>>,
    cols: u16,
    rows: u16,
    scrollback_lines: usize,
}

impl HeadlessTerminal {
    /// Create a terminal of `cols × rows` keeping `scrollback_lines` of history.
    ///
    /// Zero dimensions are clamped to 1 so the grid is always addressable.
    pub fn new(cols: u16, rows: u16, scrollback_lines: usize) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        Self {
            parser: Some(new_parser(rows, cols, scrollback_lines)),
            cols,
            rows,
            scrollback_lines,
        }
    }

    /// Feed raw output bytes through the emulator.
    ///
    /// Returns true when the chunk rang the audible bell. BEL bytes that
    /// terminate OSC sequences (title updates) do not count.
    pub fn process(&mut self, data: &[u8]) -> bool {
        match self.parser.as_mut() {
            Some(parser) => {
                let before = parser.callbacks().rung;
                parser.process(data);
                parser.callbacks().rung != before
            }
            None => {
                log::trace!("Dropping {} bytes written to disposed terminal", data.len());
                false
            }
        }
    }

    /// Resize the grid. Invalid geometry is ignored.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        if cols == 0 || rows == 0 {
            log::warn!("Ignoring headless resize to {}x{}", cols, rows);
            return;
        }
        self.cols = cols;
        self.rows = rows;
        if let Some(parser) = self.parser.as_mut() {
            parser.screen_mut().set_size(rows, cols);
        }
    }

    /// Discard all history and screen contents, keeping the geometry.
    pub fn clear(&mut self) {
        if self.parser.is_none() {
            return;
        }
        self.parser = Some(new_parser(self.rows, self.cols, self.scrollback_lines));
    }

    /// Release the grid. Idempotent.
    pub fn dispose(&mut self) {
        self.parser = None;
    }

    pub fn is_disposed(&self) -> bool {
        self.parser.is_none()
    }

    /// Current `(cols, rows)`.
    pub fn size(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    pub fn scrollback_capacity(&self) -> usize {
        self.scrollback_lines
    }
}
