//! Window coordination
//!
//! Every IPC connection is one UI window. The coordinator routes session
//! events to the window that owns each pane, moves ownership to a surviving
//! window when one closes, runs one preset chord per window, and makes sure
//! session recovery runs only once however many windows connect.

use crate::chord::{ChordAction, ChordKey, ChordMachine, ChordOutcome};
use crate::ipc::protocol::{Notification, Outgoing};
use crate::session::{RecoveryReport, SessionEvent};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use termdeck_config::{PaneId, TerminalPreset};
use tokio::sync::{OnceCell, mpsc};
use tokio::task::JoinHandle;

pub type WindowId = u64;

struct WindowEntry {
    tx: mpsc::UnboundedSender<Outgoing>,
    chord: ChordMachine,
    chord_timer: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Routing {
    /// Ordered by id, so the last entry is the most recently opened window
    windows: BTreeMap<WindowId, WindowEntry>,
    pane_owner: HashMap<PaneId, WindowId>,
}

impl Routing {
    /// Remove a window and hand its panes to the newest survivor
    fn close(&mut self, window: WindowId) {
        if let Some(entry) = self.windows.remove(&window)
            && let Some(timer) = entry.chord_timer
        {
            timer.abort();
        }
        let survivor = self.windows.keys().next_back().copied();
        let mut moved = 0usize;
        self.pane_owner.retain(|_, owner| {
            if *owner != window {
                return true;
            }
            match survivor {
                Some(survivor) => {
                    *owner = survivor;
                    moved += 1;
                    true
                }
                None => false,
            }
        });
        match survivor {
            Some(survivor) => log::info!(
                "Window {} closed, {} pane(s) now routed to window {}",
                window,
                moved,
                survivor
            ),
            None => log::info!("Window {} closed, no window left to route output to", window),
        }
    }
}

pub struct WindowCoordinator {
    routing: Mutex<Routing>,
    next_id: AtomicU64,
    init: OnceCell<RecoveryReport>,
    chord_timeout: Duration,
    presets: Vec<TerminalPreset>,
}

impl WindowCoordinator {
    pub fn new(chord_timeout: Duration, presets: Vec<TerminalPreset>) -> Self {
        Self {
            routing: Mutex::new(Routing::default()),
            next_id: AtomicU64::new(1),
            init: OnceCell::new(),
            chord_timeout,
            presets,
        }
    }

    // ========================================================================
    // Windows and ownership
    // ========================================================================

    pub fn open_window(&self, tx: mpsc::UnboundedSender<Outgoing>) -> WindowId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.routing.lock().windows.insert(
            id,
            WindowEntry {
                tx,
                chord: ChordMachine::new(self.chord_timeout),
                chord_timer: None,
            },
        );
        log::info!("Window {} opened", id);
        id
    }

    pub fn close_window(&self, window: WindowId) {
        self.routing.lock().close(window);
    }

    pub fn window_count(&self) -> usize {
        self.routing.lock().windows.len()
    }

    /// Route the pane's events to `window` from now on
    pub fn bind_pane(&self, pane_id: &str, window: WindowId) {
        let mut routing = self.routing.lock();
        if !routing.windows.contains_key(&window) {
            log::warn!("Not binding {} to closed window {}", pane_id, window);
            return;
        }
        routing.pane_owner.insert(pane_id.to_string(), window);
    }

    pub fn unbind_pane(&self, pane_id: &str) {
        self.routing.lock().pane_owner.remove(pane_id);
    }

    pub fn owner(&self, pane_id: &str) -> Option<WindowId> {
        self.routing.lock().pane_owner.get(pane_id).copied()
    }

    /// Push a notification to one window. Returns false once it is gone.
    pub fn notify(&self, window: WindowId, notification: Notification) -> bool {
        let mut routing = self.routing.lock();
        let sent = routing
            .windows
            .get(&window)
            .is_some_and(|entry| entry.tx.send(notification.into()).is_ok());
        if !sent && routing.windows.contains_key(&window) {
            routing.close(window);
        }
        sent
    }

    // ========================================================================
    // Event routing
    // ========================================================================

    /// Deliver a session event to the pane's owner.
    ///
    /// A window whose connection is gone is closed on the spot and delivery
    /// is retried against the window its panes were moved to. Events for
    /// panes without an owner are dropped.
    pub fn route(&self, event: SessionEvent) {
        let pane_id = event.pane_id().to_string();
        let notification = Notification::from_event(&event);
        let mut routing = self.routing.lock();

        while let Some(&window) = routing.pane_owner.get(&pane_id) {
            let delivered = routing
                .windows
                .get(&window)
                .is_some_and(|entry| entry.tx.send(notification.clone().into()).is_ok());
            if delivered {
                break;
            }
            log::debug!("Window {} unreachable while routing {}", window, notification.method);
            routing.close(window);
        }

        if matches!(event, SessionEvent::Exit { .. }) {
            routing.pane_owner.remove(&pane_id);
        }
    }

    /// Route events until the session manager's stream ends
    pub async fn run_event_loop(&self, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
        while let Some(event) = events.recv().await {
            self.route(event);
        }
        log::debug!("Session event stream closed");
    }

    /// Run `init` the first time any window registers; later callers get
    /// the same report
    pub async fn ensure_initialized<F, Fut>(&self, init: F) -> &RecoveryReport
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RecoveryReport>,
    {
        self.init.get_or_init(init).await
    }

    pub fn is_initialized(&self) -> bool {
        self.init.initialized()
    }

    // ========================================================================
    // Preset chord
    // ========================================================================

    /// Arm the window's chord and schedule its timeout
    pub fn chord_trigger(self: &Arc<Self>, window: WindowId) -> bool {
        let mut routing = self.routing.lock();
        let Some(entry) = routing.windows.get_mut(&window) else {
            return false;
        };
        entry.chord.trigger(Instant::now());
        if let Some(previous) = entry.chord_timer.take() {
            previous.abort();
        }

        let coordinator: Weak<Self> = Arc::downgrade(self);
        let timeout = self.chord_timeout;
        entry.chord_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(coordinator) = coordinator.upgrade() {
                coordinator.chord_timeout_elapsed(window);
            }
        }));
        true
    }

    /// Feed a key to the window's chord. Open actions are also pushed to the
    /// window as a `chord` event carrying the resolved preset.
    pub fn chord_key(&self, window: WindowId, key: &str) -> Option<ChordOutcome> {
        let outcome = {
            let mut routing = self.routing.lock();
            let entry = routing.windows.get_mut(&window)?;
            let outcome = entry.chord.handle_key(ChordKey::parse(key), Instant::now())?;
            if let Some(timer) = entry.chord_timer.take() {
                timer.abort();
            }
            outcome
        };
        self.push_chord(window, outcome.action);
        Some(outcome)
    }

    fn chord_timeout_elapsed(&self, window: WindowId) {
        let action = {
            let mut routing = self.routing.lock();
            let Some(entry) = routing.windows.get_mut(&window) else {
                return;
            };
            entry.chord_timer = None;
            entry.chord.poll(Instant::now())
        };
        if let Some(action) = action {
            crate::debug_info!("CHORD", "Chord timed out in window {}", window);
            self.push_chord(window, action);
        }
    }

    fn push_chord(&self, window: WindowId, action: ChordAction) {
        let preset = match action {
            ChordAction::OpenPreset { index } => self.presets.get(index),
            ChordAction::OpenDefaultPreset => self.presets.first(),
            ChordAction::Cancel => return,
        };
        if matches!(action, ChordAction::OpenPreset { .. }) && preset.is_none() {
            log::debug!("Chord selected missing preset {:?}", action);
        }
        self.notify(window, Notification::chord(action, preset));
    }
}
