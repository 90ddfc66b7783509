//! Process wiring
//!
//! `App` builds the session manager with its backends, restores the tab
//! tree and hands both to the IPC bridge. It also implements the
//! maintenance subcommands, which share the same setup.

use crate::backend::local::TmuxBackend;
use crate::backend::remote::RemoteBackend;
use crate::backend::{BackendSessionInfo, SessionBackend};
use crate::ipc::{self, IpcBridge};
use crate::session::{RecoveryReport, SessionManager, SessionSettings};
use crate::tab::{FileStore, KeyValueStore, TabController};
use crate::window::WindowCoordinator;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use termdeck_config::Config;
use tokio_util::sync::CancellationToken;

pub struct App {
    config: Arc<Config>,
    sessions: SessionManager,
    tabs: Arc<TabController>,
}

impl App {
    pub fn new(config: Config) -> Self {
        let sessions = SessionManager::new(SessionSettings::from_config(&config));
        sessions.register_backend(Arc::new(TmuxBackend::new(&config)));
        if let Some(remote) = &config.remote {
            log::info!("Remote terminals enabled at {}", remote.base_url);
            sessions.register_backend(Arc::new(RemoteBackend::from_config(remote)));
        }

        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(config.state_dir()));
        let tabs = Arc::new(TabController::load(sessions.clone(), store));

        Self {
            config: Arc::new(config),
            sessions,
            tabs,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn tabs(&self) -> &Arc<TabController> {
        &self.tabs
    }

    /// Serve windows on the IPC socket until Ctrl-C, then release every
    /// session and persist the tab tree.
    pub async fn serve(&self, socket: Option<PathBuf>) -> Result<()> {
        let windows = Arc::new(WindowCoordinator::new(
            Duration::from_millis(self.config.chord_timeout_ms),
            self.config.presets.clone(),
        ));
        let events = self
            .sessions
            .subscribe()
            .context("session events already subscribed")?;
        let router = {
            let windows = Arc::clone(&windows);
            tokio::spawn(async move { windows.run_event_loop(events).await })
        };

        let bridge = Arc::new(IpcBridge::new(
            self.sessions.clone(),
            Arc::clone(&self.tabs),
            windows,
            Arc::clone(&self.config),
        ));

        let shutdown = CancellationToken::new();
        let signal = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => log::info!("Interrupted, shutting down"),
                    Err(e) => log::error!("Failed to listen for Ctrl-C: {}", e),
                }
                shutdown.cancel();
            })
        };

        let path = socket.unwrap_or_else(|| self.config.socket_path());
        let served = ipc::serve(bridge, &path, shutdown.clone()).await;

        signal.abort();
        self.sessions.cleanup().await;
        self.tabs.persist();
        router.abort();
        served
    }

    /// Sessions held by every recoverable backend
    pub async fn list_sessions(&self) -> Result<Vec<(String, BackendSessionInfo)>> {
        let mut all = Vec::new();
        for backend in self.recoverable_backends() {
            let sessions = backend
                .list_sessions()
                .await
                .with_context(|| format!("list {} sessions", backend.name()))?;
            all.extend(
                sessions
                    .into_iter()
                    .map(|info| (backend.name().to_string(), info)),
            );
        }
        Ok(all)
    }

    /// Kill backend sessions that no persisted tab refers to
    pub async fn kill_orphans(&self) -> RecoveryReport {
        let known = self.tabs.leaf_ids();
        self.sessions.kill_orphans(&known).await
    }

    fn recoverable_backends(&self) -> Vec<Arc<dyn SessionBackend>> {
        self.sessions
            .backends()
            .into_iter()
            .filter(|b| b.capabilities().recoverable)
            .collect()
    }
}
