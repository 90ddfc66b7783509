//! Request dispatch for the IPC bridge.
//!
//! Method names follow the UI's channel names (`terminal-create`,
//! `tab-split-vertical`, ...). Params are camelCase JSON objects.

use super::protocol::{
    INVALID_REQUEST, IncomingMessage, IpcError, JSONRPC_VERSION, Notification, Outgoing,
    Response, error_response, success_response,
};
use crate::backend::local::LOCAL_BACKEND;
use crate::session::{CreateOrAttachParams, ResizeOutcome, SessionError, SessionManager};
use crate::tab::{SplitDirection, TabController, TabKind, TabLayout, TabPatch};
use crate::window::{WindowCoordinator, WindowId};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use termdeck_config::{Config, PaneId, TabId, WorkspaceId};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Params
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateParams {
    pane_id: PaneId,
    #[serde(default)]
    backend: Option<String>,
    #[serde(default)]
    cols: Option<u16>,
    #[serde(default)]
    rows: Option<u16>,
    #[serde(default)]
    cwd: Option<String>,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    group_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaneParams {
    pane_id: PaneId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputParams {
    pane_id: PaneId,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResizeParams {
    pane_id: PaneId,
    cols: i64,
    rows: i64,
    #[serde(default)]
    seq: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignalParams {
    pane_id: PaneId,
    signal: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetachParams {
    pane_id: PaneId,
    #[serde(default)]
    viewport_y: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteParams {
    pane_id: PaneId,
    command: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupKeyParams {
    group_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkspaceParams {
    workspace_id: WorkspaceId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TabCreateParams {
    workspace_id: WorkspaceId,
    #[serde(default = "single")]
    kind: TabKind,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddChildParams {
    group_id: TabId,
    #[serde(default = "single")]
    kind: TabKind,
}

fn single() -> TabKind {
    TabKind::Single
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TabParams {
    tab_id: TabId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TabUpdateParams {
    tab_id: TabId,
    #[serde(flatten)]
    patch: TabPatch,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReorderParams {
    tab_id: TabId,
    target_index: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutParams {
    group_id: TabId,
    #[serde(default)]
    layout: Option<TabLayout>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SplitParams {
    workspace_id: WorkspaceId,
    #[serde(default)]
    target_id: Option<TabId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupParams {
    group_id: TabId,
}

#[derive(Debug, Deserialize)]
struct ChordKeyParams {
    key: String,
}

fn parse<T: DeserializeOwned>(params: Option<Value>) -> Result<T, IpcError> {
    Ok(serde_json::from_value(
        params.unwrap_or_else(|| Value::Object(Default::default())),
    )?)
}

// ---------------------------------------------------------------------------
// Bridge
// ---------------------------------------------------------------------------

/// Shared state behind every window connection
pub struct IpcBridge {
    sessions: SessionManager,
    tabs: Arc<TabController>,
    windows: Arc<WindowCoordinator>,
    config: Arc<Config>,
}

impl IpcBridge {
    pub fn new(
        sessions: SessionManager,
        tabs: Arc<TabController>,
        windows: Arc<WindowCoordinator>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            sessions,
            tabs,
            windows,
            config,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn tabs(&self) -> &Arc<TabController> {
        &self.tabs
    }

    pub fn windows(&self) -> &Arc<WindowCoordinator> {
        &self.windows
    }

    /// Register a window connection. The first registration in the process
    /// also recovers the sessions of persisted tabs.
    pub async fn register_window(&self, tx: mpsc::UnboundedSender<Outgoing>) -> WindowId {
        let window = self.windows.open_window(tx);
        let report = self
            .windows
            .ensure_initialized(|| async {
                let known = self.tabs.leaf_ids();
                self.sessions.recover(&known).await
            })
            .await;
        crate::debug_info!(
            "IPC",
            "Window {} registered ({} session(s) recovered at startup)",
            window,
            report.reattached.len()
        );
        window
    }

    pub fn unregister_window(&self, window: WindowId) {
        self.windows.close_window(window);
    }

    /// Handle one message. Returns the response to send, if any.
    pub async fn dispatch(&self, window: WindowId, msg: IncomingMessage) -> Option<Response> {
        if msg.jsonrpc != JSONRPC_VERSION {
            return msg
                .id
                .map(|id| error_response(id, INVALID_REQUEST, "jsonrpc version must be 2.0"));
        }
        let Some(method) = msg.method else {
            log::debug!("Ignoring message without method");
            return None;
        };

        let Some(id) = msg.id else {
            self.handle_notification(window, &method, msg.params).await;
            return None;
        };

        log::trace!("<- {} ({})", method, id);
        let response = match self.call(window, &method, msg.params).await {
            Ok(result) => success_response(id, result),
            Err(e) => {
                log::debug!("{} failed: {}", method, e);
                e.into_response(id)
            }
        };
        Some(response)
    }

    async fn handle_notification(&self, window: WindowId, method: &str, params: Option<Value>) {
        if method == "terminal-input" {
            // Delivery failures are pushed back instead of answered
            let input: InputParams = match parse(params) {
                Ok(input) => input,
                Err(e) => {
                    log::debug!("Malformed terminal-input: {}", e);
                    return;
                }
            };
            if let Err(e) = self.sessions.write(&input.pane_id, input.data.as_bytes()).await {
                self.windows.notify(
                    window,
                    Notification::input_rejected(&input.pane_id, &e.to_string()),
                );
            }
            return;
        }
        if let Err(e) = self.call(window, method, params).await {
            log::debug!("Notification {} failed: {}", method, e);
        }
    }

    async fn call(
        &self,
        window: WindowId,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, IpcError> {
        match method {
            // ----------------------------------------------------------------
            // Terminals
            // ----------------------------------------------------------------
            "terminal-create" => {
                let p: CreateParams = parse(params)?;
                let pane_id = p.pane_id.clone();
                let request = CreateOrAttachParams {
                    pane_id: p.pane_id,
                    backend: p.backend.unwrap_or_else(|| LOCAL_BACKEND.to_string()),
                    cols: p.cols,
                    rows: p.rows,
                    cwd: p.cwd.map(|cwd| Config::expand_home_dir(&cwd)),
                    command: p.command,
                    target: p.target,
                    group_key: p.group_key,
                };
                let result = self.sessions.create_or_attach(request).await?;
                self.windows.bind_pane(&pane_id, window);
                Ok(serde_json::to_value(result)?)
            }
            "terminal-input" => {
                let p: InputParams = parse(params)?;
                self.sessions.write(&p.pane_id, p.data.as_bytes()).await?;
                Ok(json!({}))
            }
            "terminal-resize" => {
                let p: ResizeParams = parse(params)?;
                let cols = u32::try_from(p.cols).unwrap_or(0);
                let rows = u32::try_from(p.rows).unwrap_or(0);
                match self.sessions.resize(&p.pane_id, cols, rows).await {
                    ResizeOutcome::MirrorOnly => {
                        Err(SessionError::Unsupported { operation: "resize" }.into())
                    }
                    outcome => Ok(json!({ "applied": outcome.is_applied(), "seq": p.seq })),
                }
            }
            "terminal-signal" => {
                let p: SignalParams = parse(params)?;
                self.sessions.signal(&p.pane_id, &p.signal).await?;
                Ok(json!({}))
            }
            "terminal-detach" => {
                let p: DetachParams = parse(params)?;
                let detached = self.sessions.detach(&p.pane_id, p.viewport_y);
                if self.windows.owner(&p.pane_id) == Some(window) {
                    self.windows.unbind_pane(&p.pane_id);
                }
                Ok(json!({ "detached": detached }))
            }
            "terminal-execute-command" => {
                let p: ExecuteParams = parse(params)?;
                self.sessions.execute_command(&p.pane_id, &p.command).await?;
                Ok(json!({}))
            }
            "terminal-kill" => {
                let p: PaneParams = parse(params)?;
                let killed = self.sessions.kill(&p.pane_id).await;
                Ok(json!({ "killed": killed }))
            }
            "terminal-kill-group" => {
                let p: GroupKeyParams = parse(params)?;
                let summary = self.sessions.kill_by_group_key(&p.group_key).await;
                Ok(serde_json::to_value(summary)?)
            }
            "terminal-get-history" => {
                let p: PaneParams = parse(params)?;
                let history = self.sessions.get_history(&p.pane_id).await?;
                Ok(json!({ "history": history }))
            }
            "terminal-clear-scrollback" => {
                let p: PaneParams = parse(params)?;
                let cleared = self.sessions.clear_scrollback(&p.pane_id);
                Ok(json!({ "cleared": cleared }))
            }

            // ----------------------------------------------------------------
            // Tabs
            // ----------------------------------------------------------------
            "tab-create" => {
                let p: TabCreateParams = parse(params)?;
                Ok(serde_json::to_value(self.tabs.create(&p.workspace_id, p.kind))?)
            }
            "tab-add-child" => {
                let p: AddChildParams = parse(params)?;
                Ok(serde_json::to_value(self.tabs.add_child_tab(&p.group_id, p.kind)?)?)
            }
            "tab-remove" => {
                let p: TabParams = parse(params)?;
                let mutation = self.tabs.remove(&p.tab_id).await?;
                Ok(json!({ "removed": mutation.removed_ids() }))
            }
            "tab-update" => {
                let p: TabUpdateParams = parse(params)?;
                Ok(serde_json::to_value(self.tabs.update(&p.tab_id, p.patch)?)?)
            }
            "tab-set-active" => {
                let p: TabParams = parse(params)?;
                self.tabs.set_active(&p.tab_id)?;
                Ok(json!({}))
            }
            "tab-reorder" => {
                let p: ReorderParams = parse(params)?;
                self.tabs.reorder(&p.tab_id, p.target_index)?;
                Ok(json!({}))
            }
            "tab-update-layout" => {
                let p: LayoutParams = parse(params)?;
                let mutation = self.tabs.update_layout(&p.group_id, p.layout).await?;
                Ok(json!({ "removed": mutation.removed_ids() }))
            }
            "tab-split-vertical" | "tab-split-horizontal" => {
                let p: SplitParams = parse(params)?;
                let direction = if method == "tab-split-vertical" {
                    SplitDirection::Row
                } else {
                    SplitDirection::Column
                };
                let tab = self
                    .tabs
                    .split(&p.workspace_id, p.target_id.as_deref(), direction)?;
                Ok(serde_json::to_value(tab)?)
            }
            "tab-ungroup" => {
                let p: GroupParams = parse(params)?;
                let mutation = self.tabs.ungroup(&p.group_id)?;
                Ok(json!({ "removed": mutation.removed_ids() }))
            }
            "tab-list" => {
                let p: WorkspaceParams = parse(params)?;
                let (tabs, active) = self.tabs.read(|tree| {
                    (
                        tree.list(&p.workspace_id),
                        tree.workspace(&p.workspace_id)
                            .and_then(|ws| ws.active_tab_id.clone()),
                    )
                });
                Ok(json!({ "tabs": tabs, "activeTabId": active }))
            }

            // ----------------------------------------------------------------
            // Chord
            // ----------------------------------------------------------------
            "chord-trigger" => {
                let armed = self.windows.chord_trigger(window);
                Ok(json!({ "armed": armed }))
            }
            "chord-key" => {
                let p: ChordKeyParams = parse(params)?;
                match self.windows.chord_key(window, &p.key) {
                    Some(outcome) => Ok(json!({
                        "handled": true,
                        "action": outcome.action,
                        "suppress": outcome.suppress,
                    })),
                    None => Ok(json!({ "handled": false, "suppress": false })),
                }
            }

            "config-get" => Ok(json!({
                "presets": self.config.presets,
                "chordTimeoutMs": self.config.chord_timeout_ms,
                "backends": self
                    .sessions
                    .backends()
                    .iter()
                    .map(|b| json!({ "name": b.name(), "capabilities": b.capabilities() }))
                    .collect::<Vec<_>>(),
            })),

            _ => Err(IpcError::MethodNotFound(method.to_string())),
        }
    }
}
