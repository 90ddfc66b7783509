//! Per-pane session lifecycle.
//!
//! Creation is coalesced per pane id through a map of shared futures: a
//! second `create_or_attach` for a pane whose creation is still running
//! awaits the same outcome instead of spawning a duplicate process. The
//! creation task itself moves the finished session from the pending map
//! into the session map while holding the pending lock, so anything that
//! waited on the pending future observes the session afterwards.
//!
//! Lock order is always `pending` before `sessions`. No lock is held across
//! an `.await`.

use super::batcher::OutputBatcher;
use super::error::SessionError;
use super::live::LiveSession;
use super::pump::OutputPump;
use super::types::{
    CreateOrAttachParams, CreateOrAttachResult, KillSummary, ResizeOutcome, SessionEvent,
    SessionSettings,
};
use crate::backend::{AttachRequest, BackendCapabilities, SessionBackend};
use futures::future::{BoxFuture, FutureExt, Shared, join_all};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use termdeck_config::PaneId;
use termdeck_terminal::HeadlessTerminal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

type PendingCreate = Shared<BoxFuture<'static, Result<CreateOrAttachResult, SessionError>>>;

pub(super) struct Inner {
    pub(super) settings: SessionSettings,
    backends: RwLock<HashMap<String, Arc<dyn SessionBackend>>>,
    pub(super) sessions: Mutex<HashMap<PaneId, Arc<LiveSession>>>,
    pending: Mutex<HashMap<PaneId, PendingCreate>>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<SessionEvent>>>,
    shutting_down: AtomicBool,
}

/// How a session's process is let go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    /// Terminate the process and report the exit
    Kill,
    /// Detach from a persistent process, leaving it running
    Release,
}

/// Cheap to clone; all clones share the same sessions.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.session_count())
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

enum CreateStep {
    Wait(PendingCreate),
    Reattach(Arc<LiveSession>),
}

impl SessionManager {
    pub fn new(settings: SessionSettings) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                settings,
                backends: RwLock::new(HashMap::new()),
                sessions: Mutex::new(HashMap::new()),
                pending: Mutex::new(HashMap::new()),
                events_tx,
                events_rx: Mutex::new(Some(events_rx)),
                shutting_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.inner.settings
    }

    /// Register a backend under its [`SessionBackend::name`], replacing any
    /// previous one of that name
    pub fn register_backend(&self, backend: Arc<dyn SessionBackend>) {
        let name = backend.name().to_string();
        log::debug!("Registering session backend '{}'", name);
        self.inner.backends.write().insert(name, backend);
    }

    pub fn backend(&self, name: &str) -> Option<Arc<dyn SessionBackend>> {
        self.inner.backends.read().get(name).cloned()
    }

    /// Registered backends, ordered by name
    pub fn backends(&self) -> Vec<Arc<dyn SessionBackend>> {
        let mut backends: Vec<_> = self.inner.backends.read().values().cloned().collect();
        backends.sort_by(|a, b| a.name().cmp(b.name()));
        backends
    }

    /// Take the event receiver. Only the first call gets it.
    pub fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.inner.events_rx.lock().take()
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Attach to the pane's live session, or create one.
    ///
    /// Concurrent calls for the same pane share a single creation. Backend
    /// failures are returned as-is without retrying.
    pub async fn create_or_attach(
        &self,
        params: CreateOrAttachParams,
    ) -> Result<CreateOrAttachResult, SessionError> {
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }
        let geometry = self.resolve_geometry(params.cols, params.rows)?;

        let step = {
            let mut pending = self.inner.pending.lock();
            if let Some(creation) = pending.get(&params.pane_id) {
                crate::debug_info!("SESSION", "Joining pending creation of {}", params.pane_id);
                CreateStep::Wait(creation.clone())
            } else if let Some(session) = self.live_or_evict(&params.pane_id) {
                CreateStep::Reattach(session)
            } else {
                let pane_id = params.pane_id.clone();
                let inner = Arc::clone(&self.inner);
                let task = tokio::spawn(create_session(inner, params, geometry));
                let creation = async move {
                    task.await.unwrap_or_else(|e| {
                        Err(SessionError::Backend(format!("session creation task failed: {e}")))
                    })
                }
                .boxed()
                .shared();
                pending.insert(pane_id, creation.clone());
                CreateStep::Wait(creation)
            }
        };

        match step {
            CreateStep::Wait(creation) => creation.await,
            CreateStep::Reattach(session) => {
                let explicit = geometry.explicit.then_some((geometry.cols, geometry.rows));
                Ok(self.reattach(session, explicit).await)
            }
        }
    }

    /// Explicit zero dimensions are rejected; missing ones take the defaults.
    fn resolve_geometry(
        &self,
        cols: Option<u16>,
        rows: Option<u16>,
    ) -> Result<RequestedGeometry, SessionError> {
        if cols == Some(0) || rows == Some(0) {
            return Err(SessionError::InvalidGeometry {
                cols: u32::from(cols.unwrap_or(0)),
                rows: u32::from(rows.unwrap_or(0)),
            });
        }
        Ok(RequestedGeometry {
            cols: cols.unwrap_or(self.inner.settings.default_cols),
            rows: rows.unwrap_or(self.inner.settings.default_rows),
            explicit: cols.is_some() && rows.is_some(),
        })
    }

    async fn reattach(
        &self,
        session: Arc<LiveSession>,
        geometry: Option<(u16, u16)>,
    ) -> CreateOrAttachResult {
        let viewport_y = {
            let mut state = session.state.lock();
            state.last_active = Instant::now();
            state.detached = false;
            state.viewport_y
        };
        if let Some((cols, rows)) = geometry {
            self.resize(&session.pane_id, u32::from(cols), u32::from(rows))
                .await;
        }
        let scrollback = session.terminal.lock().serialize();
        log::info!(
            "Reattached session {} ({} bytes of scrollback)",
            session.pane_id,
            scrollback.len()
        );
        CreateOrAttachResult {
            is_new: false,
            scrollback,
            was_recovered: session.was_recovered,
            viewport_y,
        }
    }

    // ========================================================================
    // Operations on live sessions
    // ========================================================================

    /// Live session for the pane. A dead record left in the map is dropped
    /// so the next creation spawns a fresh process.
    fn live_or_evict(&self, pane_id: &str) -> Option<Arc<LiveSession>> {
        let mut sessions = self.inner.sessions.lock();
        match sessions.get(pane_id) {
            Some(session) if session.is_alive() => Some(Arc::clone(session)),
            Some(_) => {
                log::debug!("Evicting dead session record for {}", pane_id);
                sessions.remove(pane_id);
                None
            }
            None => None,
        }
    }

    fn live(&self, pane_id: &str) -> Option<Arc<LiveSession>> {
        self.inner
            .sessions
            .lock()
            .get(pane_id)
            .filter(|s| s.is_alive())
            .cloned()
    }

    pub async fn write(&self, pane_id: &str, data: &[u8]) -> Result<(), SessionError> {
        let session = self
            .live(pane_id)
            .ok_or_else(|| SessionError::NotFound(pane_id.to_string()))?;
        if !session.capabilities.write {
            return Err(SessionError::Unsupported { operation: "write" });
        }
        session.touch();
        session.process.write(data).await?;
        Ok(())
    }

    /// Type a command line into the pane and submit it
    pub async fn execute_command(&self, pane_id: &str, command: &str) -> Result<(), SessionError> {
        let mut line = String::with_capacity(command.len() + 1);
        line.push_str(command);
        line.push('\r');
        self.write(pane_id, line.as_bytes()).await
    }

    /// Resize the pane's terminal.
    ///
    /// Never fails: invalid geometry or an unknown pane is logged and
    /// ignored. On a backend without remote resize only the local mirror
    /// changes and the caller is told so.
    pub async fn resize(&self, pane_id: &str, cols: u32, rows: u32) -> ResizeOutcome {
        let (Ok(cols), Ok(rows)) = (u16::try_from(cols), u16::try_from(rows)) else {
            log::warn!("Ignoring resize of {} to {}x{}", pane_id, cols, rows);
            return ResizeOutcome::Ignored;
        };
        if cols == 0 || rows == 0 {
            log::warn!("Ignoring resize of {} to {}x{}", pane_id, cols, rows);
            return ResizeOutcome::Ignored;
        }
        let Some(session) = self.live(pane_id) else {
            log::debug!("Resize for unknown pane {}", pane_id);
            return ResizeOutcome::Ignored;
        };

        session.terminal.lock().resize(cols, rows);
        {
            let mut state = session.state.lock();
            state.cols = cols;
            state.rows = rows;
            state.last_active = Instant::now();
        }
        if !session.capabilities.remote_resize {
            log::warn!(
                "Resize of {} to {}x{} is not yet supported by its backend",
                pane_id,
                cols,
                rows
            );
            return ResizeOutcome::MirrorOnly;
        }
        if let Err(e) = session.process.resize(cols, rows).await {
            log::warn!("Backend resize of {} failed: {}", pane_id, e);
        }
        ResizeOutcome::Applied
    }

    pub async fn signal(&self, pane_id: &str, signal: &str) -> Result<(), SessionError> {
        let session = self
            .live(pane_id)
            .ok_or_else(|| SessionError::NotFound(pane_id.to_string()))?;
        if !session.capabilities.signal {
            return Err(SessionError::Unsupported {
                operation: "signal",
            });
        }
        session.process.signal(signal).await?;
        Ok(())
    }

    /// Record that no window shows the pane any more. The process keeps
    /// running.
    pub fn detach(&self, pane_id: &str, viewport_y: Option<u32>) -> bool {
        let Some(session) = self.live(pane_id) else {
            return false;
        };
        let mut state = session.state.lock();
        state.detached = true;
        state.viewport_y = viewport_y;
        crate::debug_info!("SESSION", "Detached {} at viewport {:?}", pane_id, viewport_y);
        true
    }

    /// Drop the pane's history by recreating its terminal at the same size
    pub fn clear_scrollback(&self, pane_id: &str) -> bool {
        match self.live(pane_id) {
            Some(session) => {
                session.terminal.lock().clear();
                true
            }
            None => false,
        }
    }

    /// Serialized history of the pane, from the live terminal or else from
    /// whichever backend still holds the session
    pub async fn get_history(&self, pane_id: &str) -> Result<String, SessionError> {
        if let Some(session) = self.live(pane_id) {
            return Ok(session.terminal.lock().serialize());
        }
        for backend in self.backends() {
            match backend.history(pane_id).await {
                Ok(Some(history)) => return Ok(history),
                Ok(None) => {}
                Err(e) => log::debug!("{} history for {}: {}", backend.name(), pane_id, e),
            }
        }
        Err(SessionError::NotFound(pane_id.to_string()))
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Kill the pane's session. Idempotent; returns whether a session was
    /// found. An in-flight creation for the pane is awaited first.
    pub async fn kill(&self, pane_id: &str) -> bool {
        self.kill_reporting(pane_id).await.is_some()
    }

    /// `None` when no session existed, otherwise whether the backend kill
    /// succeeded
    async fn kill_reporting(&self, pane_id: &str) -> Option<bool> {
        let creation = self.inner.pending.lock().get(pane_id).cloned();
        if let Some(creation) = creation {
            let _ = creation.await;
        }
        let Some(session) = self.inner.sessions.lock().remove(pane_id) else {
            log::debug!("Kill for unknown pane {}", pane_id);
            return None;
        };
        log::info!("Killing session {}", pane_id);
        Some(teardown(&self.inner.events_tx, session, Teardown::Kill).await)
    }

    /// Kill every session created with `group_key`
    pub async fn kill_by_group_key(&self, group_key: &str) -> KillSummary {
        let panes: Vec<PaneId> = self
            .inner
            .sessions
            .lock()
            .values()
            .filter(|s| s.group_key.as_deref() == Some(group_key))
            .map(|s| s.pane_id.clone())
            .collect();

        let outcomes = join_all(panes.iter().map(|pane| self.kill_reporting(pane))).await;
        let mut summary = KillSummary::default();
        for outcome in outcomes.into_iter().flatten() {
            if outcome {
                summary.killed += 1;
            } else {
                summary.failed += 1;
            }
        }
        log::info!(
            "Killed group '{}': {} killed, {} failed",
            group_key,
            summary.killed,
            summary.failed
        );
        summary
    }

    /// Let go of every session for shutdown.
    ///
    /// Persistent backends keep their processes so the next start can
    /// recover them. Creations that finish after this point are released
    /// immediately and report [`SessionError::Closed`].
    pub async fn cleanup(&self) {
        self.inner.shutting_down.store(true, Ordering::SeqCst);

        let pending: Vec<PendingCreate> = self.inner.pending.lock().values().cloned().collect();
        join_all(pending).await;

        let sessions: Vec<Arc<LiveSession>> = self
            .inner
            .sessions
            .lock()
            .drain()
            .map(|(_, session)| session)
            .collect();
        log::info!("Releasing {} sessions", sessions.len());
        join_all(
            sessions
                .into_iter()
                .map(|session| teardown(&self.inner.events_tx, session, Teardown::Release)),
        )
        .await;
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn is_alive(&self, pane_id: &str) -> bool {
        self.live(pane_id).is_some()
    }

    pub fn pane_ids(&self) -> Vec<PaneId> {
        let mut ids: Vec<PaneId> = self.inner.sessions.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.lock().len()
    }

    pub fn capabilities(&self, pane_id: &str) -> Option<BackendCapabilities> {
        self.live(pane_id).map(|s| s.capabilities)
    }

    /// Current `(cols, rows)` of the pane
    pub fn geometry(&self, pane_id: &str) -> Option<(u16, u16)> {
        self.live(pane_id).map(|s| {
            let state = s.state.lock();
            (state.cols, state.rows)
        })
    }

    /// Whether the pane's session is live but shown in no window
    pub fn is_detached(&self, pane_id: &str) -> Option<bool> {
        self.live(pane_id).map(|s| s.state.lock().detached)
    }
}

#[derive(Debug, Clone, Copy)]
struct RequestedGeometry {
    cols: u16,
    rows: u16,
    /// Both dimensions were given by the caller
    explicit: bool,
}

/// Body of the spawned creation task
async fn create_session(
    inner: Arc<Inner>,
    params: CreateOrAttachParams,
    geometry: RequestedGeometry,
) -> Result<CreateOrAttachResult, SessionError> {
    let pane_id = params.pane_id.clone();
    let opened = open_session(&inner, params, geometry).await;

    let rejected = {
        let mut pending = inner.pending.lock();
        pending.remove(&pane_id);
        let (session, result) = opened?;
        if !inner.shutting_down.load(Ordering::SeqCst) {
            let mut sessions = inner.sessions.lock();
            if session.is_alive() {
                sessions.insert(pane_id, session);
            } else {
                log::debug!("Session {} exited during creation", pane_id);
            }
            return Ok(result);
        }
        session
    };

    log::info!("Releasing session {} created during shutdown", pane_id);
    teardown(&inner.events_tx, rejected, Teardown::Release).await;
    Err(SessionError::Closed)
}

async fn open_session(
    inner: &Arc<Inner>,
    params: CreateOrAttachParams,
    geometry: RequestedGeometry,
) -> Result<(Arc<LiveSession>, CreateOrAttachResult), SessionError> {
    let backend = inner
        .backends
        .read()
        .get(&params.backend)
        .cloned()
        .ok_or_else(|| SessionError::Unavailable(format!("unknown backend '{}'", params.backend)))?;

    let cancel = CancellationToken::new();
    let attached = backend
        .attach_or_create(AttachRequest {
            pane_id: params.pane_id.clone(),
            cols: geometry.cols,
            rows: geometry.rows,
            cwd: params.cwd,
            command: params.command,
            target: params.target,
            cancel: cancel.clone(),
        })
        .await?;

    let terminal = HeadlessTerminal::new(
        geometry.cols,
        geometry.rows,
        inner.settings.scrollback_lines,
    );
    let was_recovered = attached.was_recovered;
    let session = Arc::new(LiveSession::new(
        params.pane_id.clone(),
        backend.name().to_string(),
        params.group_key.or(attached.group_key),
        backend.capabilities(),
        attached.process,
        terminal,
        was_recovered,
        cancel,
    ));

    let pump = OutputPump {
        session: Arc::clone(&session),
        manager: Arc::downgrade(inner),
        events: inner.events_tx.clone(),
        batch_interval: inner.settings.batch_interval,
        batcher: OutputBatcher::new(inner.settings.batch_max_bytes),
    };
    let handle = tokio::spawn(pump.run(attached.output));
    *session.pump.lock() = Some(handle);

    log::info!(
        "Created {} session {} ({}x{}, recovered: {})",
        backend.name(),
        params.pane_id,
        geometry.cols,
        geometry.rows,
        was_recovered
    );
    Ok((
        session,
        CreateOrAttachResult {
            is_new: true,
            scrollback: String::new(),
            was_recovered,
            viewport_y: None,
        },
    ))
}

/// Stop the session's output, let go of its process and release the
/// terminal. Returns whether the backend call succeeded.
async fn teardown(
    events: &mpsc::UnboundedSender<SessionEvent>,
    session: Arc<LiveSession>,
    mode: Teardown,
) -> bool {
    session.mark_dead();

    // The pump flushes buffered output once it sees the cancellation
    let pump = session.pump.lock().take();
    if let Some(pump) = pump
        && let Err(e) = pump.await
    {
        log::warn!("Output pump for {} panicked: {}", session.pane_id, e);
    }

    let result = match mode {
        Teardown::Kill => session.process.kill().await,
        Teardown::Release => session.process.release().await,
    };
    session.terminal.lock().dispose();
    if mode == Teardown::Kill {
        session.emit_exit(None, events);
    }

    match result {
        Ok(()) => true,
        Err(e) => {
            log::warn!("{:?} of session {} failed: {}", mode, session.pane_id, e);
            false
        }
    }
}
