//! Read-only remote terminals
//!
//! The remote host provisions terminals on its own; this backend only
//! finds them and polls their output by offset. Input, resize and signals
//! are not supported.
//!
//! Sub-modules:
//! - [`api`]: `RemoteTerminalApi` trait and its HTTP implementation.
//! - [`auth`]: HMAC-signed internal tokens.

pub mod api;
pub mod auth;

use super::{
    AttachRequest, Attached, BackendCapabilities, BackendError, BackendOutput, BackendProcess,
    BackendSessionInfo, SessionBackend,
};
use api::{HttpRemoteApi, RemoteTerminalApi};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use termdeck_config::RemoteConfig;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Registry name of this backend
pub const REMOTE_BACKEND: &str = "remote";

pub struct RemoteBackend {
    api: Arc<dyn RemoteTerminalApi>,
    poll_interval: Duration,
}

impl RemoteBackend {
    pub fn new(api: Arc<dyn RemoteTerminalApi>, poll_interval: Duration) -> Self {
        Self { api, poll_interval }
    }

    pub fn from_config(config: &RemoteConfig) -> Self {
        Self::new(
            Arc::new(HttpRemoteApi::new(config)),
            Duration::from_millis(config.poll_interval_ms),
        )
    }
}

#[async_trait]
impl SessionBackend for RemoteBackend {
    fn name(&self) -> &str {
        REMOTE_BACKEND
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            write: false,
            remote_resize: false,
            signal: false,
            recoverable: false,
        }
    }

    async fn attach_or_create(&self, request: AttachRequest) -> Result<Attached, BackendError> {
        let terminal_id = request
            .target
            .clone()
            .unwrap_or_else(|| request.pane_id.clone());
        let terminal = self
            .api
            .list_terminals()
            .await?
            .into_iter()
            .find(|t| t.id == terminal_id || t.pane_id.as_deref() == Some(terminal_id.as_str()))
            .ok_or_else(|| {
                BackendError::Unavailable(format!(
                    "no remote terminal provisioned for {}",
                    terminal_id
                ))
            })?;
        if !terminal.alive {
            return Err(BackendError::Unavailable(format!(
                "remote terminal {} has exited",
                terminal.id
            )));
        }

        log::info!(
            "Polling remote terminal {} for pane {} every {:?}",
            terminal.id,
            request.pane_id,
            self.poll_interval
        );
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(poll_output(
            self.api.clone(),
            terminal.id.clone(),
            self.poll_interval,
            tx,
            request.cancel.clone(),
        ));

        Ok(Attached {
            process: Box::new(RemoteProcess {
                api: self.api.clone(),
                terminal_id: terminal.id,
                cancel: request.cancel,
            }),
            output: rx,
            was_recovered: true,
            group_key: terminal.group_key,
        })
    }

    async fn list_sessions(&self) -> Result<Vec<BackendSessionInfo>, BackendError> {
        Ok(self
            .api
            .list_terminals()
            .await?
            .into_iter()
            .map(|t| BackendSessionInfo {
                pane_id: t.pane_id.unwrap_or_else(|| t.id.clone()),
                key: t.id,
                attached: false,
            })
            .collect())
    }

    fn session_key(&self, pane_id: &str) -> String {
        pane_id.to_string()
    }

    async fn kill_session(&self, info: &BackendSessionInfo) -> Result<(), BackendError> {
        self.api.kill_terminal(&info.key).await
    }

    async fn history(&self, pane_id: &str) -> Result<Option<String>, BackendError> {
        let chunk = self.api.fetch_output(pane_id, 0).await?;
        Ok(Some(chunk.data))
    }
}

/// Poll a terminal's output until it exits or `cancel` fires.
///
/// Cancellation is checked before every request and again before anything
/// fetched is forwarded, so nothing is emitted for a dead session.
async fn poll_output(
    api: Arc<dyn RemoteTerminalApi>,
    terminal_id: String,
    interval: Duration,
    tx: mpsc::UnboundedSender<BackendOutput>,
    cancel: CancellationToken,
) {
    let mut offset = 0u64;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if cancel.is_cancelled() {
            break;
        }

        match api.fetch_output(&terminal_id, offset).await {
            Ok(chunk) => {
                if cancel.is_cancelled() {
                    break;
                }
                offset = chunk.offset;
                if !chunk.data.is_empty()
                    && tx.send(BackendOutput::Data(chunk.data.into_bytes())).is_err()
                {
                    break;
                }
                if !chunk.alive {
                    let _ = tx.send(BackendOutput::Exit(chunk.exit_code));
                    break;
                }
            }
            Err(e) => log::warn!("Polling remote terminal {} failed: {}", terminal_id, e),
        }
    }
    log::debug!("Stopped polling remote terminal {}", terminal_id);
}

struct RemoteProcess {
    api: Arc<dyn RemoteTerminalApi>,
    terminal_id: String,
    cancel: CancellationToken,
}

#[async_trait]
impl BackendProcess for RemoteProcess {
    async fn kill(&self) -> Result<(), BackendError> {
        self.cancel.cancel();
        self.api.kill_terminal(&self.terminal_id).await
    }

    async fn release(&self) -> Result<(), BackendError> {
        self.cancel.cancel();
        Ok(())
    }
}
