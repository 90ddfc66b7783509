//! Startup reconciliation of persistent backend sessions.

use super::manager::SessionManager;
use super::types::{CreateOrAttachParams, RecoveryReport};
use termdeck_config::PaneId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reconcile {
    /// Reattach known sessions; orphans follow `kill_orphan_sessions`
    Recover,
    /// Leave known sessions alone and kill every orphan
    KillOrphans,
}

impl SessionManager {
    /// Reconcile sessions that outlived the previous process.
    ///
    /// Every recoverable backend is asked for its sessions. Those belonging
    /// to a pane in `known_panes` are reattached; the rest are orphans,
    /// killed when `kill_orphan_sessions` is set and otherwise left running.
    pub async fn recover(&self, known_panes: &[PaneId]) -> RecoveryReport {
        self.reconcile(known_panes, Reconcile::Recover).await
    }

    /// Kill every backend session whose pane is not in `known_panes`
    pub async fn kill_orphans(&self, known_panes: &[PaneId]) -> RecoveryReport {
        self.reconcile(known_panes, Reconcile::KillOrphans).await
    }

    async fn reconcile(&self, known_panes: &[PaneId], mode: Reconcile) -> RecoveryReport {
        let mut report = RecoveryReport::default();
        let kill_orphans = match mode {
            Reconcile::Recover => self.settings().kill_orphan_sessions,
            Reconcile::KillOrphans => true,
        };

        for backend in self.backends() {
            if !backend.capabilities().recoverable {
                continue;
            }
            let sessions = match backend.list_sessions().await {
                Ok(sessions) => sessions,
                Err(e) if e.is_unsupported() => continue,
                Err(e) => {
                    log::warn!("Could not list {} sessions: {}", backend.name(), e);
                    continue;
                }
            };
            log::info!(
                "Reconciling {} {} session(s) against {} known pane(s)",
                sessions.len(),
                backend.name(),
                known_panes.len()
            );

            for info in sessions {
                let known = known_panes.contains(&info.pane_id)
                    && backend.session_key(&info.pane_id) == info.key;

                if known {
                    if mode == Reconcile::KillOrphans || self.is_alive(&info.pane_id) {
                        continue;
                    }
                    let params = CreateOrAttachParams::new(info.pane_id.clone())
                        .backend(backend.name());
                    match self.create_or_attach(params).await {
                        Ok(_) => report.reattached.push(info.pane_id),
                        Err(e) => {
                            log::warn!("Could not reattach {}: {}", info.key, e);
                            report.failed.push(info.key);
                        }
                    }
                } else if kill_orphans {
                    match backend.kill_session(&info).await {
                        Ok(()) => {
                            log::info!("Killed orphan session {}", info.key);
                            report.orphans_killed.push(info.key);
                        }
                        Err(e) => {
                            log::warn!("Could not kill orphan session {}: {}", info.key, e);
                            report.failed.push(info.key);
                        }
                    }
                } else {
                    log::info!("Keeping orphan session {}", info.key);
                    report.orphans_kept.push(info.key);
                }
            }
        }
        report
    }
}
