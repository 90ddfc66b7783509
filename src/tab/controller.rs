//! Shared, persisted tab tree paired with session teardown
//!
//! `TabController` is the handle the IPC layer uses. Every successful
//! mutation is persisted; removals also kill the sessions of the `Single`
//! tabs they deleted.

use super::error::TabError;
use super::layout::{SplitDirection, TabLayout};
use super::persistence::{KeyValueStore, load_tree, save_tree};
use super::tree::TabTree;
use super::types::{Tab, TabKind, TabMutation, TabPatch};
use crate::session::SessionManager;
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;
use termdeck_config::TabId;

pub struct TabController {
    tree: Mutex<TabTree>,
    sessions: SessionManager,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl TabController {
    pub fn new(
        tree: TabTree,
        sessions: SessionManager,
        store: Option<Arc<dyn KeyValueStore>>,
    ) -> Self {
        Self {
            tree: Mutex::new(tree),
            sessions,
            store,
        }
    }

    /// Restore the persisted tree, starting empty if none is stored or it
    /// cannot be read
    pub fn load(sessions: SessionManager, store: Arc<dyn KeyValueStore>) -> Self {
        let tree = match load_tree(store.as_ref()) {
            Ok(Some(tree)) => tree,
            Ok(None) => TabTree::new(),
            Err(e) => {
                log::warn!("Discarding persisted tab tree: {:#}", e);
                TabTree::new()
            }
        };
        Self::new(tree, sessions, Some(store))
    }

    /// Run a read-only closure against the tree
    pub fn read<R>(&self, f: impl FnOnce(&TabTree) -> R) -> R {
        f(&self.tree.lock())
    }

    pub fn leaf_ids(&self) -> Vec<TabId> {
        self.read(|tree| tree.leaf_ids())
    }

    pub fn list(&self, workspace_id: &str) -> Vec<Tab> {
        self.read(|tree| tree.list(workspace_id))
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    pub fn create(&self, workspace_id: &str, kind: TabKind) -> Tab {
        let tab = self.tree.lock().create(workspace_id, kind);
        self.persist();
        tab
    }

    pub fn add_child_tab(&self, group_id: &str, kind: TabKind) -> Result<Tab, TabError> {
        self.mutate(|tree| tree.add_child_tab(group_id, kind))
    }

    pub fn update(&self, id: &str, patch: TabPatch) -> Result<Tab, TabError> {
        self.mutate(|tree| tree.update(id, patch))
    }

    pub fn set_active(&self, id: &str) -> Result<(), TabError> {
        self.mutate(|tree| tree.set_active(id))
    }

    pub fn reorder(&self, id: &str, target_position: usize) -> Result<(), TabError> {
        self.mutate(|tree| tree.reorder(id, target_position))
    }

    pub fn split(
        &self,
        workspace_id: &str,
        target: Option<&str>,
        direction: SplitDirection,
    ) -> Result<Tab, TabError> {
        self.mutate(|tree| tree.split(workspace_id, target, direction))
    }

    pub fn ungroup(&self, group_id: &str) -> Result<TabMutation, TabError> {
        self.mutate(|tree| tree.ungroup(group_id))
    }

    pub async fn remove(&self, id: &str) -> Result<TabMutation, TabError> {
        let mutation = self.mutate(|tree| tree.remove(id))?;
        self.kill_sessions(&mutation).await;
        Ok(mutation)
    }

    pub async fn update_layout(
        &self,
        group_id: &str,
        layout: Option<TabLayout>,
    ) -> Result<TabMutation, TabError> {
        let mutation = self.mutate(|tree| tree.update_layout(group_id, layout))?;
        self.kill_sessions(&mutation).await;
        Ok(mutation)
    }

    /// Persist the current tree, logging failures
    pub fn persist(&self) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let tree = self.tree.lock();
        if let Err(e) = save_tree(store.as_ref(), &tree) {
            log::error!("Failed to persist tab tree: {:#}", e);
        }
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut TabTree) -> Result<R, TabError>) -> Result<R, TabError> {
        let result = {
            let mut tree = self.tree.lock();
            let result = f(&mut tree);
            if cfg!(debug_assertions)
                && let Err(e) = tree.check_invariants()
            {
                log::error!("{}", e);
            }
            result
        };
        if result.is_ok() {
            self.persist();
        }
        result
    }

    async fn kill_sessions(&self, mutation: &TabMutation) {
        let panes = mutation.removed_panes();
        if panes.is_empty() {
            return;
        }
        log::debug!("Killing sessions of removed tabs: {:?}", panes);
        join_all(panes.iter().map(|pane| self.sessions.kill(pane))).await;
    }
}
