//! IPC bridge between UI windows and the session core
//!
//! # Module layout
//!
//! - [`protocol`]: JSON-RPC 2.0 wire types, error codes and push notifications
//! - [`handlers`]: `IpcBridge`, which dispatches requests to sessions, tabs and
//!   the window coordinator
//! - [`server`]: Unix socket listener, one connection per window

pub mod handlers;
pub mod protocol;
pub mod server;

pub use handlers::IpcBridge;
pub use protocol::{IncomingMessage, IpcError, Notification, Outgoing, Response, RpcError};
pub use server::{handle_connection, serve};
