//! Shared integration test helpers for termdeck.
//!
//! This module provides a scriptable in-memory session backend, an
//! in-memory key-value store and small async helpers used across the
//! `tests/` integration test suite.
//!
//! # Usage
//!
//! Include this module at the top of each test file that needs it:
//!
//! ```ignore
//! mod common;
//! use common::{MockBackend, manager_with};
//! ```
//!
//! Note: Rust integration tests use `mod common;` (not `use`) to bring in
//! helpers from `tests/common/mod.rs`. The `#[allow(dead_code)]` attribute
//! suppresses warnings when only a subset of helpers are used per file.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use termdeck::backend::{
    AttachRequest, Attached, BackendCapabilities, BackendError, BackendOutput, BackendProcess,
    BackendSessionInfo, SessionBackend,
};
use termdeck::session::{SessionEvent, SessionManager, SessionSettings};
use termdeck::tab::KeyValueStore;
use tokio::sync::mpsc;

pub const MOCK_BACKEND: &str = "mock";

pub const INTERACTIVE: BackendCapabilities = BackendCapabilities {
    write: true,
    remote_resize: true,
    signal: true,
    recoverable: true,
};

pub const READ_ONLY: BackendCapabilities = BackendCapabilities {
    write: false,
    remote_resize: false,
    signal: false,
    recoverable: false,
};

// ============================================================================
// Mock backend
// ============================================================================

/// What a test can observe about one attached mock process
#[derive(Default)]
pub struct MockProcessState {
    pub written: Mutex<Vec<u8>>,
    pub resizes: Mutex<Vec<(u16, u16)>>,
    pub signals: Mutex<Vec<String>>,
    pub killed: AtomicBool,
    pub released: AtomicBool,
}

struct MockProcess {
    state: Arc<MockProcessState>,
}

#[async_trait]
impl BackendProcess for MockProcess {
    async fn write(&self, data: &[u8]) -> Result<(), BackendError> {
        self.state.written.lock().extend_from_slice(data);
        Ok(())
    }

    async fn resize(&self, cols: u16, rows: u16) -> Result<(), BackendError> {
        self.state.resizes.lock().push((cols, rows));
        Ok(())
    }

    async fn signal(&self, signal: &str) -> Result<(), BackendError> {
        self.state.signals.lock().push(signal.to_string());
        Ok(())
    }

    async fn kill(&self) -> Result<(), BackendError> {
        self.state.killed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn release(&self) -> Result<(), BackendError> {
        self.state.released.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct Attachment {
    output: mpsc::UnboundedSender<BackendOutput>,
    state: Arc<MockProcessState>,
}

/// In-memory backend that counts attach calls and lets tests drive output
pub struct MockBackend {
    name: String,
    capabilities: BackendCapabilities,
    attach_delay: Duration,
    attach_calls: AtomicUsize,
    exit_on_attach: AtomicBool,
    assigned_group: Mutex<Option<String>>,
    fail_attach: Mutex<Option<String>>,
    attachments: Mutex<HashMap<String, Attachment>>,
    /// Sessions reported by `list_sessions`, as pane ids
    existing: Mutex<Vec<String>>,
    killed_sessions: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::with_capabilities(MOCK_BACKEND, INTERACTIVE)
    }

    pub fn with_capabilities(name: &str, capabilities: BackendCapabilities) -> Self {
        Self {
            name: name.to_string(),
            capabilities,
            attach_delay: Duration::ZERO,
            attach_calls: AtomicUsize::new(0),
            exit_on_attach: AtomicBool::new(false),
            assigned_group: Mutex::new(None),
            fail_attach: Mutex::new(None),
            attachments: Mutex::new(HashMap::new()),
            existing: Mutex::new(Vec::new()),
            killed_sessions: Mutex::new(Vec::new()),
        }
    }

    /// Make every attach take `delay`, so concurrent calls overlap
    pub fn with_attach_delay(mut self, delay: Duration) -> Self {
        self.attach_delay = delay;
        self
    }

    /// Make the next attaches hand back a process that has already exited
    pub fn exit_on_attach(&self, exit: bool) {
        self.exit_on_attach.store(exit, Ordering::SeqCst);
    }

    /// File new sessions under `group` the way a remote host would
    pub fn assign_group(&self, group: Option<&str>) {
        *self.assigned_group.lock() = group.map(str::to_string);
    }

    pub fn attach_count(&self) -> usize {
        self.attach_calls.load(Ordering::SeqCst)
    }

    /// Fail attaches with `Unavailable(reason)` until cleared
    pub fn fail_attach(&self, reason: Option<&str>) {
        *self.fail_attach.lock() = reason.map(str::to_string);
    }

    /// Pretend a session for `pane_id` survived from a previous run
    pub fn add_existing_session(&self, pane_id: &str) {
        self.existing.lock().push(pane_id.to_string());
    }

    pub fn killed_sessions(&self) -> Vec<String> {
        self.killed_sessions.lock().clone()
    }

    pub fn process(&self, pane_id: &str) -> Option<Arc<MockProcessState>> {
        self.attachments
            .lock()
            .get(pane_id)
            .map(|a| Arc::clone(&a.state))
    }

    pub fn send_output(&self, pane_id: &str, bytes: &[u8]) {
        if let Some(a) = self.attachments.lock().get(pane_id) {
            let _ = a.output.send(BackendOutput::Data(bytes.to_vec()));
        }
    }

    /// End the pane's process on its own
    pub fn exit(&self, pane_id: &str, code: Option<i32>) {
        if let Some(a) = self.attachments.lock().get(pane_id) {
            let _ = a.output.send(BackendOutput::Exit(code));
        }
    }
}

#[async_trait]
impl SessionBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }

    async fn attach_or_create(&self, request: AttachRequest) -> Result<Attached, BackendError> {
        self.attach_calls.fetch_add(1, Ordering::SeqCst);
        if !self.attach_delay.is_zero() {
            tokio::time::sleep(self.attach_delay).await;
        }
        if let Some(reason) = self.fail_attach.lock().clone() {
            return Err(BackendError::Unavailable(reason));
        }

        let was_recovered = self.existing.lock().contains(&request.pane_id);
        let (tx, rx) = mpsc::unbounded_channel();
        if self.exit_on_attach.load(Ordering::SeqCst) {
            let _ = tx.send(BackendOutput::Exit(Some(1)));
        }
        let state = Arc::new(MockProcessState::default());
        self.attachments.lock().insert(
            request.pane_id.clone(),
            Attachment {
                output: tx,
                state: Arc::clone(&state),
            },
        );
        Ok(Attached {
            process: Box::new(MockProcess { state }),
            output: rx,
            was_recovered,
            group_key: self.assigned_group.lock().clone(),
        })
    }

    async fn list_sessions(&self) -> Result<Vec<BackendSessionInfo>, BackendError> {
        Ok(self
            .existing
            .lock()
            .iter()
            .map(|pane| BackendSessionInfo {
                key: self.session_key(pane),
                pane_id: pane.clone(),
                attached: false,
            })
            .collect())
    }

    fn session_key(&self, pane_id: &str) -> String {
        format!("mock-{pane_id}")
    }

    async fn kill_session(&self, info: &BackendSessionInfo) -> Result<(), BackendError> {
        self.existing.lock().retain(|p| p != &info.pane_id);
        self.killed_sessions.lock().push(info.key.clone());
        Ok(())
    }

    async fn history(&self, pane_id: &str) -> Result<Option<String>, BackendError> {
        Ok(self
            .existing
            .lock()
            .iter()
            .any(|p| p == pane_id)
            .then(|| format!("history of {pane_id}")))
    }
}

// ============================================================================
// Managers and stores
// ============================================================================

/// Settings with a short batch interval so tests don't wait long
pub fn test_settings() -> SessionSettings {
    SessionSettings {
        batch_interval: Duration::from_millis(5),
        ..SessionSettings::default()
    }
}

pub fn manager_with(backend: Arc<MockBackend>) -> SessionManager {
    let manager = SessionManager::new(test_settings());
    manager.register_backend(backend);
    manager
}

/// Key-value store kept in memory
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

// ============================================================================
// Async helpers
// ============================================================================

/// Receive events until one matches, failing the test after a second
pub async fn wait_for_event(
    rx: &mut mpsc::UnboundedReceiver<SessionEvent>,
    mut matches: impl FnMut(&SessionEvent) -> bool,
) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            match rx.recv().await {
                Some(event) if matches(&event) => return event,
                Some(_) => continue,
                None => panic!("event stream closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for session event")
}

/// Collect all `Data` text for `pane_id` that arrives within `window`
pub async fn collect_data(
    rx: &mut mpsc::UnboundedReceiver<SessionEvent>,
    pane_id: &str,
    window: Duration,
) -> String {
    let mut text = String::new();
    let deadline = tokio::time::Instant::now() + window;
    while let Ok(Some(event)) = tokio::time::timeout_at(deadline, rx.recv()).await {
        if let SessionEvent::Data { pane_id: p, data } = event
            && p == pane_id
        {
            text.push_str(&data);
        }
    }
    text
}
