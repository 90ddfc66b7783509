//! JSON-RPC 2.0 wire types and response helpers.
//!
//! Messages are framed one per line. Requests carry an `id` and get exactly
//! one response; notifications (no `id`) never do. Pushes from the server to
//! a window are notifications whose method names the stream and pane, e.g.
//! `data:<paneId>`.

use crate::chord::ChordAction;
use crate::session::{SessionError, SessionEvent};
use crate::tab::TabError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use termdeck_config::TerminalPreset;
use thiserror::Error;

pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
/// A session or tab operation failed
pub const OPERATION_FAILED: i64 = -32000;
/// The session's backend lacks the capability
pub const UNSUPPORTED: i64 = -32001;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// An incoming JSON-RPC 2.0 message from a window.
#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

/// An outgoing JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Value,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A server push.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub jsonrpc: &'static str,
    pub method: String,
    pub params: Value,
}

/// Anything written to a window's connection.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Outgoing {
    Response(Response),
    Notification(Notification),
}

impl From<Response> for Outgoing {
    fn from(response: Response) -> Self {
        Outgoing::Response(response)
    }
}

impl From<Notification> for Outgoing {
    fn from(notification: Notification) -> Self {
        Outgoing::Notification(notification)
    }
}

// ---------------------------------------------------------------------------
// Response constructors
// ---------------------------------------------------------------------------

/// Build a success response.
pub fn success_response(id: Value, result: Value) -> Response {
    Response {
        jsonrpc: JSONRPC_VERSION,
        result: Some(result),
        error: None,
        id,
    }
}

/// Build an error response.
pub fn error_response(id: Value, code: i64, message: impl Into<String>) -> Response {
    Response {
        jsonrpc: JSONRPC_VERSION,
        result: None,
        error: Some(RpcError {
            code,
            message: message.into(),
            data: None,
        }),
        id,
    }
}

/// Build a method-not-found error response.
pub fn method_not_found(id: Value, method: &str) -> Response {
    error_response(id, METHOD_NOT_FOUND, format!("Method not found: {method}"))
}

/// Build a parse error response.
pub fn parse_error() -> Response {
    error_response(Value::Null, PARSE_ERROR, "Parse error")
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

impl Notification {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: method.into(),
            params,
        }
    }

    pub fn from_event(event: &SessionEvent) -> Self {
        match event {
            SessionEvent::Data { pane_id, data } => {
                Self::new(format!("data:{pane_id}"), json!({ "data": data }))
            }
            SessionEvent::Exit { pane_id, code } => {
                Self::new(format!("exit:{pane_id}"), json!({ "code": code }))
            }
            SessionEvent::Attention { pane_id } => {
                Self::new(format!("attention:{pane_id}"), json!({}))
            }
        }
    }

    /// A resolved chord and the preset it opens, if any
    pub fn chord(action: ChordAction, preset: Option<&TerminalPreset>) -> Self {
        Self::new("chord", json!({ "action": action, "preset": preset }))
    }

    /// Fire-and-forget input that could not be delivered
    pub fn input_rejected(pane_id: &str, message: &str) -> Self {
        Self::new(
            format!("input-rejected:{pane_id}"),
            json!({ "message": message }),
        )
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure of a single request
#[derive(Debug, Error)]
pub enum IpcError {
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Tab(#[from] TabError),
}

impl IpcError {
    pub fn code(&self) -> i64 {
        match self {
            IpcError::MethodNotFound(_) => METHOD_NOT_FOUND,
            IpcError::InvalidParams(_) => INVALID_PARAMS,
            IpcError::Session(SessionError::Unsupported { .. }) => UNSUPPORTED,
            IpcError::Session(SessionError::InvalidGeometry { .. }) => INVALID_PARAMS,
            IpcError::Tab(TabError::InvalidLayout { .. }) => INVALID_PARAMS,
            IpcError::Session(_) | IpcError::Tab(_) => OPERATION_FAILED,
        }
    }

    pub fn into_response(self, id: Value) -> Response {
        error_response(id, self.code(), self.to_string())
    }
}

impl From<serde_json::Error> for IpcError {
    fn from(e: serde_json::Error) -> Self {
        IpcError::InvalidParams(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
