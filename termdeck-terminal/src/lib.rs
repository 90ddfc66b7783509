//! Headless terminal for termdeck sessions.
//!
//! Every live session mirrors its raw output into a [`HeadlessTerminal`] so
//! the scrollback can be serialized to plain text when a UI window reattaches.
//! Nothing here is rendered; the terminal only tracks grid and history state.
//!
//! - [`headless`] - lifecycle: write, resize, clear, dispose
//! - [`serialize`] - plain-text extraction of history plus the visible screen

pub mod headless;
pub mod serialize;

pub use headless::HeadlessTerminal;
