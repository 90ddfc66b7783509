//! Per-session output task.
//!
//! One task per session consumes the backend's output channel in order,
//! feeds the headless terminal immediately and forwards text to subscribers
//! in batches: a batch is flushed once it reaches the size limit or when
//! the batch interval has passed since its first byte.

use super::batcher::OutputBatcher;
use super::live::LiveSession;
use super::manager::Inner;
use super::types::SessionEvent;
use crate::backend::BackendOutput;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

pub(super) struct OutputPump {
    pub(super) session: Arc<LiveSession>,
    pub(super) manager: Weak<Inner>,
    pub(super) events: mpsc::UnboundedSender<SessionEvent>,
    pub(super) batch_interval: Duration,
    pub(super) batcher: OutputBatcher,
}

impl OutputPump {
    pub(super) async fn run(mut self, mut output: mpsc::UnboundedReceiver<BackendOutput>) {
        let cancel = self.session.cancel.clone();
        let mut deadline: Option<Instant> = None;

        loop {
            let flush_timer = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    // Forward output that already arrived, then stop
                    while let Ok(BackendOutput::Data(bytes)) = output.try_recv() {
                        self.ingest(&bytes);
                    }
                    self.flush(true);
                    break;
                }
                message = output.recv() => match message {
                    Some(BackendOutput::Data(bytes)) => {
                        if self.batcher.is_empty() {
                            deadline = Some(Instant::now() + self.batch_interval);
                        }
                        self.ingest(&bytes);
                        if self.batcher.is_full() {
                            self.flush(false);
                            deadline = None;
                        }
                    }
                    Some(BackendOutput::Exit(code)) => {
                        self.flush(true);
                        self.finish(code);
                        break;
                    }
                    None => {
                        self.flush(true);
                        if !cancel.is_cancelled() {
                            self.finish(None);
                        }
                        break;
                    }
                },
                _ = flush_timer => {
                    self.flush(false);
                    deadline = None;
                }
            }

            // A held-back partial character starts a fresh interval
            if deadline.is_none() && !self.batcher.is_empty() {
                deadline = Some(Instant::now() + self.batch_interval);
            }
        }
        log::debug!("Output pump for {} stopped", self.session.pane_id);
    }

    fn ingest(&mut self, bytes: &[u8]) {
        let rang_bell = self.session.terminal.lock().process(bytes);
        self.batcher.push(bytes);
        if rang_bell {
            let _ = self.events.send(SessionEvent::Attention {
                pane_id: self.session.pane_id.clone(),
            });
        }
    }

    fn flush(&mut self, force: bool) {
        if let Some(data) = self.batcher.take(force) {
            let _ = self.events.send(SessionEvent::Data {
                pane_id: self.session.pane_id.clone(),
                data,
            });
        }
    }

    /// The session ended on its own
    fn finish(&self, code: Option<i32>) {
        let session = &self.session;
        if let Some(inner) = self.manager.upgrade() {
            // Marked dead under the map lock so creation can't insert it after
            let mut sessions = inner.sessions.lock();
            session.mark_dead();
            if sessions
                .get(&session.pane_id)
                .is_some_and(|s| Arc::ptr_eq(s, session))
            {
                sessions.remove(&session.pane_id);
            }
        } else {
            session.mark_dead();
        }
        session.terminal.lock().dispose();
        log::info!("Session {} exited with {:?}", session.pane_id, code);
        session.emit_exit(code, &self.events);
    }
}
