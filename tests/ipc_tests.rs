//! JSON-RPC bridge over in-memory connections.

mod common;

use common::{MOCK_BACKEND, MockBackend, READ_ONLY, manager_with};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use termdeck::config::{Config, TerminalPreset};
use termdeck::ipc::{IpcBridge, handle_connection};
use termdeck::tab::{TabController, TabKind, TabTree};
use termdeck::window::WindowCoordinator;
use tokio::io::{
    AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
};

// ============================================================================
// Harness
// ============================================================================

fn presets() -> Vec<TerminalPreset> {
    vec![
        TerminalPreset {
            name: "shell".into(),
            command: None,
            cwd: None,
        },
        TerminalPreset {
            name: "htop".into(),
            command: Some("htop".into()),
            cwd: None,
        },
    ]
}

fn bridge_with_tree(backend: &Arc<MockBackend>, tree: TabTree) -> Arc<IpcBridge> {
    let manager = manager_with(Arc::clone(backend));
    let events = manager.subscribe().unwrap();
    let config = Config {
        chord_timeout_ms: 100,
        presets: presets(),
        ..Config::default()
    };
    let windows = Arc::new(WindowCoordinator::new(
        Duration::from_millis(config.chord_timeout_ms),
        config.presets.clone(),
    ));
    {
        let windows = Arc::clone(&windows);
        tokio::spawn(async move { windows.run_event_loop(events).await });
    }
    let tabs = Arc::new(TabController::new(tree, manager.clone(), None));
    Arc::new(IpcBridge::new(manager, tabs, windows, Arc::new(config)))
}

fn bridge(backend: &Arc<MockBackend>) -> Arc<IpcBridge> {
    bridge_with_tree(backend, TabTree::new())
}

/// One window's end of a connection
struct Client {
    writer: WriteHalf<DuplexStream>,
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    next_id: u64,
    /// Pushes read while waiting for a response
    pushes: Vec<Value>,
}

impl Client {
    fn connect(bridge: &Arc<IpcBridge>) -> Self {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server);
        tokio::spawn(handle_connection(Arc::clone(bridge), server_read, server_write));
        let (read, writer) = tokio::io::split(client);
        Self {
            writer,
            lines: BufReader::new(read).lines(),
            next_id: 1,
            pushes: Vec::new(),
        }
    }

    async fn send_line(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn read_message(&mut self) -> Value {
        let line = tokio::time::timeout(Duration::from_secs(1), self.lines.next_line())
            .await
            .expect("timed out waiting for a message")
            .unwrap()
            .expect("connection closed");
        serde_json::from_str(&line).unwrap()
    }

    /// Send a request and return the whole response object
    async fn request(&mut self, method: &str, params: Value) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        let msg = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        self.send_line(&msg.to_string()).await;
        loop {
            let message = self.read_message().await;
            if message.get("id") == Some(&json!(id)) {
                return message;
            }
            self.pushes.push(message);
        }
    }

    /// Send a request that must succeed and return its result
    async fn call(&mut self, method: &str, params: Value) -> Value {
        let response = self.request(method, params).await;
        assert!(
            response.get("error").is_none(),
            "{method} failed: {response}"
        );
        response["result"].clone()
    }

    async fn notify(&mut self, method: &str, params: Value) {
        let msg = json!({ "jsonrpc": "2.0", "method": method, "params": params });
        self.send_line(&msg.to_string()).await;
    }

    /// Next push whose method is `method`
    async fn push(&mut self, method: &str) -> Value {
        if let Some(i) = self.pushes.iter().position(|p| p["method"] == method) {
            return self.pushes.remove(i);
        }
        loop {
            let message = self.read_message().await;
            if message["method"] == method {
                return message;
            }
            self.pushes.push(message);
        }
    }

    /// Whether a push for `method` arrives within `window`
    async fn receives(&mut self, method: &str, window: Duration) -> bool {
        tokio::time::timeout(window, self.push(method)).await.is_ok()
    }
}

fn error_code(response: &Value) -> i64 {
    response["error"]["code"].as_i64().unwrap()
}

async fn create_pane(client: &mut Client, pane: &str) -> Value {
    client
        .call(
            "terminal-create",
            json!({ "paneId": pane, "backend": MOCK_BACKEND, "cols": 80, "rows": 24 }),
        )
        .await
}

// ============================================================================
// Terminals
// ============================================================================

#[tokio::test]
async fn test_create_routes_output_to_owner() {
    let backend = Arc::new(MockBackend::new());
    let bridge = bridge(&backend);
    let mut owner = Client::connect(&bridge);
    let mut other = Client::connect(&bridge);

    let result = create_pane(&mut owner, "p1").await;
    assert_eq!(result["isNew"], true);
    assert_eq!(result["scrollback"], "");
    other.call("tab-list", json!({ "workspaceId": "w" })).await;

    backend.send_output("p1", b"hello");
    let push = owner.push("data:p1").await;
    assert_eq!(push["params"]["data"], "hello");
    assert!(push.get("id").is_none());
    assert!(!other.receives("data:p1", Duration::from_millis(50)).await);
}

#[tokio::test]
async fn test_exit_is_pushed_once() {
    let backend = Arc::new(MockBackend::new());
    let bridge = bridge(&backend);
    let mut client = Client::connect(&bridge);
    create_pane(&mut client, "p1").await;

    let killed = client.call("terminal-kill", json!({ "paneId": "p1" })).await;
    assert_eq!(killed, json!({ "killed": true }));
    let exit = client.push("exit:p1").await;
    assert_eq!(exit["params"]["code"], Value::Null);

    let again = client.call("terminal-kill", json!({ "paneId": "p1" })).await;
    assert_eq!(again, json!({ "killed": false }));
    assert!(!client.receives("exit:p1", Duration::from_millis(50)).await);
}

#[tokio::test]
async fn test_resize_echoes_sequence() {
    let backend = Arc::new(MockBackend::new());
    let bridge = bridge(&backend);
    let mut client = Client::connect(&bridge);
    create_pane(&mut client, "p1").await;

    let rejected = client
        .call(
            "terminal-resize",
            json!({ "paneId": "p1", "cols": 0, "rows": 24, "seq": 7 }),
        )
        .await;
    assert_eq!(rejected, json!({ "applied": false, "seq": 7 }));

    let negative = client
        .call(
            "terminal-resize",
            json!({ "paneId": "p1", "cols": -5, "rows": 24, "seq": 8 }),
        )
        .await;
    assert_eq!(negative["applied"], false);

    let applied = client
        .call(
            "terminal-resize",
            json!({ "paneId": "p1", "cols": 100, "rows": 30, "seq": 9 }),
        )
        .await;
    assert_eq!(applied, json!({ "applied": true, "seq": 9 }));
    assert_eq!(bridge.sessions().geometry("p1"), Some((100, 30)));
}

#[tokio::test]
async fn test_fire_and_forget_input_rejection_is_pushed() {
    let backend = Arc::new(MockBackend::new());
    let bridge = bridge(&backend);
    let mut client = Client::connect(&bridge);

    client
        .notify("terminal-input", json!({ "paneId": "ghost", "data": "ls\r" }))
        .await;
    let push = client.push("input-rejected:ghost").await;
    assert!(
        push["params"]["message"]
            .as_str()
            .unwrap()
            .contains("ghost")
    );
}

#[tokio::test]
async fn test_input_reaches_backend() {
    let backend = Arc::new(MockBackend::new());
    let bridge = bridge(&backend);
    let mut client = Client::connect(&bridge);
    create_pane(&mut client, "p1").await;

    client
        .notify("terminal-input", json!({ "paneId": "p1", "data": "ls" }))
        .await;
    client
        .call(
            "terminal-execute-command",
            json!({ "paneId": "p1", "command": "pwd" }),
        )
        .await;

    let process = backend.process("p1").unwrap();
    assert_eq!(process.written.lock().as_slice(), b"lspwd\r");
}

#[tokio::test]
async fn test_unsupported_write_has_distinct_code() {
    let backend = Arc::new(MockBackend::new());
    let bridge = bridge(&backend);
    bridge
        .sessions()
        .register_backend(Arc::new(MockBackend::with_capabilities("cloud", READ_ONLY)));
    let mut client = Client::connect(&bridge);
    client
        .call("terminal-create", json!({ "paneId": "r1", "backend": "cloud" }))
        .await;

    let response = client
        .request("terminal-input", json!({ "paneId": "r1", "data": "x" }))
        .await;
    assert_eq!(error_code(&response), -32001);

    let missing = client
        .request("terminal-input", json!({ "paneId": "ghost", "data": "x" }))
        .await;
    assert_eq!(error_code(&missing), -32000);
}

#[tokio::test]
async fn test_resize_on_read_only_backend_is_unsupported() {
    let backend = Arc::new(MockBackend::new());
    let bridge = bridge(&backend);
    bridge
        .sessions()
        .register_backend(Arc::new(MockBackend::with_capabilities("cloud", READ_ONLY)));
    let mut client = Client::connect(&bridge);
    client
        .call(
            "terminal-create",
            json!({ "paneId": "r1", "backend": "cloud", "cols": 80, "rows": 24 }),
        )
        .await;

    let response = client
        .request(
            "terminal-resize",
            json!({ "paneId": "r1", "cols": 100, "rows": 30, "seq": 1 }),
        )
        .await;
    assert_eq!(error_code(&response), -32001);
    assert!(
        response["error"]["message"]
            .as_str()
            .unwrap()
            .contains("resize")
    );
    // The local mirror still follows the window
    assert_eq!(bridge.sessions().geometry("r1"), Some((100, 30)));
}

#[tokio::test]
async fn test_detach_then_reattach_from_another_window() {
    let backend = Arc::new(MockBackend::new());
    let bridge = bridge(&backend);
    let mut first = Client::connect(&bridge);
    let mut second = Client::connect(&bridge);
    create_pane(&mut first, "p1").await;
    backend.send_output("p1", b"before detach\r\n");
    first.push("data:p1").await;

    first
        .call("terminal-detach", json!({ "paneId": "p1", "viewportY": 3 }))
        .await;
    assert_eq!(bridge.windows().owner("p1"), None);

    let result = create_pane(&mut second, "p1").await;
    assert_eq!(result["isNew"], false);
    assert_eq!(result["viewportY"], 3);
    assert!(
        result["scrollback"]
            .as_str()
            .unwrap()
            .contains("before detach")
    );
    assert_eq!(backend.attach_count(), 1);

    backend.send_output("p1", b"after");
    assert_eq!(second.push("data:p1").await["params"]["data"], "after");
}

#[tokio::test]
async fn test_history_and_clear() {
    let backend = Arc::new(MockBackend::new());
    let bridge = bridge(&backend);
    let mut client = Client::connect(&bridge);
    create_pane(&mut client, "p1").await;
    backend.send_output("p1", b"remember me\r\n");
    client.push("data:p1").await;

    let history = client
        .call("terminal-get-history", json!({ "paneId": "p1" }))
        .await;
    assert!(history["history"].as_str().unwrap().contains("remember me"));

    client
        .call("terminal-clear-scrollback", json!({ "paneId": "p1" }))
        .await;
    let history = client
        .call("terminal-get-history", json!({ "paneId": "p1" }))
        .await;
    assert_eq!(history["history"], "");
}

#[tokio::test]
async fn test_kill_group() {
    let backend = Arc::new(MockBackend::new());
    let bridge = bridge(&backend);
    let mut client = Client::connect(&bridge);
    for pane in ["a", "b"] {
        client
            .call(
                "terminal-create",
                json!({ "paneId": pane, "backend": MOCK_BACKEND, "groupKey": "job" }),
            )
            .await;
    }

    let summary = client
        .call("terminal-kill-group", json!({ "groupKey": "job" }))
        .await;
    assert_eq!(summary, json!({ "killed": 2, "failed": 0 }));
}

#[tokio::test]
async fn test_dropped_window_hands_panes_to_survivor() {
    let backend = Arc::new(MockBackend::new());
    let bridge = bridge(&backend);
    let mut survivor = Client::connect(&bridge);
    survivor.call("tab-list", json!({ "workspaceId": "w" })).await;
    let mut doomed = Client::connect(&bridge);
    create_pane(&mut doomed, "p1").await;
    drop(doomed);

    tokio::time::timeout(Duration::from_secs(1), async {
        while bridge.windows().window_count() > 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    backend.send_output("p1", b"still here");
    assert_eq!(
        survivor.push("data:p1").await["params"]["data"],
        "still here"
    );
    assert!(bridge.sessions().is_alive("p1"));
}

// ============================================================================
// Protocol errors
// ============================================================================

#[tokio::test]
async fn test_protocol_errors() {
    let backend = Arc::new(MockBackend::new());
    let bridge = bridge(&backend);
    let mut client = Client::connect(&bridge);

    let unknown = client.request("terminal-teleport", json!({})).await;
    assert_eq!(error_code(&unknown), -32601);

    let bad_params = client.request("terminal-kill", json!({ "pane": 1 })).await;
    assert_eq!(error_code(&bad_params), -32602);

    let zero = client
        .request(
            "terminal-create",
            json!({ "paneId": "p1", "backend": MOCK_BACKEND, "cols": 0, "rows": 24 }),
        )
        .await;
    assert_eq!(error_code(&zero), -32602);

    client.send_line("{not json").await;
    let parse = client.read_message().await;
    assert_eq!(error_code(&parse), -32700);
    assert_eq!(parse["id"], Value::Null);

    client
        .send_line(r#"{"jsonrpc":"1.0","id":99,"method":"tab-list"}"#)
        .await;
    let version = client.read_message().await;
    assert_eq!(error_code(&version), -32600);
    assert_eq!(version["id"], 99);

    // Still serving after errors
    client.call("tab-list", json!({ "workspaceId": "w" })).await;
}

// ============================================================================
// Tabs
// ============================================================================

#[tokio::test]
async fn test_tab_methods() {
    let backend = Arc::new(MockBackend::new());
    let bridge = bridge(&backend);
    let mut client = Client::connect(&bridge);

    let tab = client.call("tab-create", json!({ "workspaceId": "w" })).await;
    assert_eq!(tab["kind"], "single");
    assert_eq!(tab["position"], 0);

    let new_tab = client
        .call("tab-split-vertical", json!({ "workspaceId": "w" }))
        .await;
    let group_id = new_tab["parentId"].as_str().unwrap().to_string();

    let listed = client.call("tab-list", json!({ "workspaceId": "w" })).await;
    assert_eq!(listed["tabs"].as_array().unwrap().len(), 3);
    assert_eq!(listed["activeTabId"], group_id.as_str());
    let group = &listed["tabs"][0];
    assert_eq!(
        group["layout"],
        json!({
            "direction": "row",
            "first": tab["id"],
            "second": new_tab["id"],
            "splitPercentage": 50.0
        })
    );

    let renamed = client
        .call("tab-update", json!({ "tabId": tab["id"], "title": "logs" }))
        .await;
    assert_eq!(renamed["title"], "logs");

    let invalid = client
        .request(
            "tab-update-layout",
            json!({ "groupId": group_id, "layout": "not-a-child" }),
        )
        .await;
    assert_eq!(error_code(&invalid), -32602);

    let ungrouped = client
        .call("tab-ungroup", json!({ "groupId": group_id }))
        .await;
    assert_eq!(ungrouped["removed"], json!([group_id]));
    let listed = client.call("tab-list", json!({ "workspaceId": "w" })).await;
    assert_eq!(listed["tabs"].as_array().unwrap().len(), 2);

    let missing = client.request("tab-remove", json!({ "tabId": "ghost" })).await;
    assert_eq!(error_code(&missing), -32000);
}

#[tokio::test]
async fn test_tab_remove_kills_session() {
    let backend = Arc::new(MockBackend::new());
    let bridge = bridge(&backend);
    let mut client = Client::connect(&bridge);

    let tab = client.call("tab-create", json!({ "workspaceId": "w" })).await;
    let pane = tab["id"].as_str().unwrap().to_string();
    create_pane(&mut client, &pane).await;

    let removed = client.call("tab-remove", json!({ "tabId": pane })).await;
    assert_eq!(removed["removed"], json!([pane]));
    client.push(&format!("exit:{pane}")).await;
    assert!(!bridge.sessions().is_alive(&pane));
}

// ============================================================================
// Startup recovery
// ============================================================================

#[tokio::test]
async fn test_recovery_runs_once_across_windows() {
    let mut tree = TabTree::new();
    let known = tree.create("w", TabKind::Single).id;
    let backend = Arc::new(MockBackend::new());
    backend.add_existing_session(&known);
    backend.add_existing_session("stale");
    let bridge = bridge_with_tree(&backend, tree);

    let mut first = Client::connect(&bridge);
    first.call("tab-list", json!({ "workspaceId": "w" })).await;
    let mut second = Client::connect(&bridge);
    second.call("tab-list", json!({ "workspaceId": "w" })).await;

    assert!(bridge.windows().is_initialized());
    assert_eq!(backend.attach_count(), 1);
    assert_eq!(backend.killed_sessions(), vec!["mock-stale".to_string()]);

    let attached = create_pane(&mut second, &known).await;
    assert_eq!(attached["isNew"], false);
    assert_eq!(attached["wasRecovered"], true);
}

// ============================================================================
// Preset chord
// ============================================================================

#[tokio::test]
async fn test_chord_digit_opens_preset() {
    let backend = Arc::new(MockBackend::new());
    let bridge = bridge(&backend);
    let mut client = Client::connect(&bridge);

    let idle = client.call("chord-key", json!({ "key": "2" })).await;
    assert_eq!(idle, json!({ "handled": false, "suppress": false }));

    let armed = client.call("chord-trigger", json!({})).await;
    assert_eq!(armed, json!({ "armed": true }));
    let outcome = client.call("chord-key", json!({ "key": "2" })).await;
    assert_eq!(
        outcome,
        json!({
            "handled": true,
            "action": { "type": "open_preset", "index": 1 },
            "suppress": true
        })
    );

    let push = client.push("chord").await;
    assert_eq!(push["params"]["preset"]["name"], "htop");
    // The timeout was cancelled by the digit
    assert!(!client.receives("chord", Duration::from_millis(200)).await);
}

#[tokio::test]
async fn test_chord_timeout_opens_default_preset() {
    let backend = Arc::new(MockBackend::new());
    let bridge = bridge(&backend);
    let mut client = Client::connect(&bridge);

    client.call("chord-trigger", json!({})).await;
    let push = client.push("chord").await;
    assert_eq!(
        push["params"]["action"],
        json!({ "type": "open_default_preset" })
    );
    assert_eq!(push["params"]["preset"]["name"], "shell");
}

#[tokio::test]
async fn test_chord_other_key_cancels_without_push() {
    let backend = Arc::new(MockBackend::new());
    let bridge = bridge(&backend);
    let mut client = Client::connect(&bridge);

    client.call("chord-trigger", json!({})).await;
    let outcome = client.call("chord-key", json!({ "key": "x" })).await;
    assert_eq!(outcome["action"], json!({ "type": "cancel" }));
    assert_eq!(outcome["suppress"], false);
    assert!(!client.receives("chord", Duration::from_millis(200)).await);
}

#[tokio::test]
async fn test_config_get_lists_backends() {
    let backend = Arc::new(MockBackend::new());
    let bridge = bridge(&backend);
    let mut client = Client::connect(&bridge);

    let config = client.call("config-get", json!({})).await;
    assert_eq!(config["chordTimeoutMs"], 100);
    assert_eq!(config["presets"].as_array().unwrap().len(), 2);
    assert_eq!(config["backends"][0]["name"], MOCK_BACKEND);
}

#[tokio::test]
async fn test_serve_accepts_successive_connections() {
    use tokio::net::UnixStream;
    use tokio_util::sync::CancellationToken;

    let backend = Arc::new(MockBackend::new());
    let bridge = bridge(&backend);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("termdeck.sock");
    let shutdown = CancellationToken::new();
    let server = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        let path = path.clone();
        let shutdown = shutdown.clone();
        async move { termdeck::ipc::serve(bridge, &path, shutdown).await }
    });

    for id in 1..=2 {
        let stream = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                match UnixStream::connect(&path).await {
                    Ok(stream) => return stream,
                    Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
                }
            }
        })
        .await
        .expect("socket never came up");
        let (reader, mut writer) = stream.into_split();
        let request = json!({ "jsonrpc": "2.0", "id": id, "method": "config-get" });
        writer
            .write_all(format!("{request}\n").as_bytes())
            .await
            .unwrap();
        let mut lines = BufReader::new(reader).lines();
        let line = tokio::time::timeout(Duration::from_secs(1), lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let response: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(response["id"], id);
        assert_eq!(response["result"]["chordTimeoutMs"], 100);
    }

    shutdown.cancel();
    server.await.unwrap().unwrap();
    assert!(!path.exists());
}
