// Library exports for the binary and the integration tests
//
// # Mutex Usage Policy
//
//   - `parking_lot::Mutex`: sync-only maps and records (sessions, pending
//                           creations, tab tree, window routing). Never
//                           held across an `.await`: take what you need
//                           inside a scoped block, then await.
//
//   - `tokio::sync::OnceCell`: one-shot async initialization (session
//                              recovery on first window registration).
//
// Lock order inside `SessionManager` is `pending` before `sessions`.

/// Application version (root crate version, for use by sub-crates).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[macro_use]
pub mod debug;

pub mod app;
pub mod backend;
pub mod chord;
pub mod cli;
pub mod config;
pub mod http;
pub mod ipc;
pub mod session;
pub mod tab;
pub mod window;
