//! Record of one live session.

use super::types::SessionEvent;
use crate::backend::{BackendCapabilities, BackendProcess};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use termdeck_config::PaneId;
use termdeck_terminal::HeadlessTerminal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub(super) struct SessionState {
    pub(super) cols: u16,
    pub(super) rows: u16,
    pub(super) last_active: Instant,
    pub(super) viewport_y: Option<u32>,
    /// No UI window currently shows the session
    pub(super) detached: bool,
}

pub(super) struct LiveSession {
    pub(super) pane_id: PaneId,
    pub(super) backend: String,
    pub(super) group_key: Option<String>,
    pub(super) capabilities: BackendCapabilities,
    pub(super) process: Box<dyn BackendProcess>,
    pub(super) terminal: Arc<Mutex<HeadlessTerminal>>,
    pub(super) state: Mutex<SessionState>,
    pub(super) was_recovered: bool,
    /// Fires the moment the session is considered dead
    pub(super) cancel: CancellationToken,
    alive: AtomicBool,
    exit_emitted: AtomicBool,
    pub(super) pump: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSession")
            .field("pane_id", &self.pane_id)
            .field("backend", &self.backend)
            .field("group_key", &self.group_key)
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}

impl LiveSession {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        pane_id: PaneId,
        backend: String,
        group_key: Option<String>,
        capabilities: BackendCapabilities,
        process: Box<dyn BackendProcess>,
        terminal: HeadlessTerminal,
        was_recovered: bool,
        cancel: CancellationToken,
    ) -> Self {
        let (cols, rows) = terminal.size();
        Self {
            pane_id,
            backend,
            group_key,
            capabilities,
            process,
            terminal: Arc::new(Mutex::new(terminal)),
            state: Mutex::new(SessionState {
                cols,
                rows,
                last_active: Instant::now(),
                viewport_y: None,
                detached: false,
            }),
            was_recovered,
            cancel,
            alive: AtomicBool::new(true),
            exit_emitted: AtomicBool::new(false),
            pump: Mutex::new(None),
        }
    }

    pub(super) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Mark dead and revoke the cancellation token in the same step, so no
    /// poller or reader can fire for this session afterwards
    pub(super) fn mark_dead(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.cancel.cancel();
    }

    pub(super) fn touch(&self) {
        self.state.lock().last_active = Instant::now();
    }

    /// Emit the exit event unless one was already sent
    pub(super) fn emit_exit(&self, code: Option<i32>, events: &mpsc::UnboundedSender<SessionEvent>) {
        if self.exit_emitted.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = events.send(SessionEvent::Exit {
            pane_id: self.pane_id.clone(),
            code,
        });
    }
}
