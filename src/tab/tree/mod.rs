//! Tab tree: workspaces, tabs, group layouts and focus history
//!
//! `TabTree` is the single source of truth for tab structure. All mutations
//! go through it so the structural invariants hold after every operation.
//!
//! Sub-modules:
//! - [`creation`]: Create, add child, update, activate and reorder.
//! - [`removal`]: Remove, replace group layouts and active-tab fallback.
//! - [`split`]: Vertical/horizontal splits and ungrouping.
//! - [`invariants`]: Structural validation.

mod creation;
mod invariants;
mod removal;
mod split;

use super::error::TabError;
use super::types::{Tab, TabKind, Workspace};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use termdeck_config::{TabId, WorkspaceId};

/// Serializable form of a [`TabTree`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabTreeSnapshot {
    #[serde(default)]
    pub workspaces: Vec<Workspace>,
    #[serde(default)]
    pub tabs: Vec<Tab>,
}

/// Owns every tab and workspace of the process
#[derive(Debug, Clone, Default)]
pub struct TabTree {
    pub(super) tabs: BTreeMap<TabId, Tab>,
    pub(super) workspaces: BTreeMap<WorkspaceId, Workspace>,
}

impl TabTree {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get(&self, id: &str) -> Option<&Tab> {
        self.tabs.get(id)
    }

    pub fn workspace(&self, id: &str) -> Option<&Workspace> {
        self.workspaces.get(id)
    }

    pub fn workspaces(&self) -> impl Iterator<Item = &Workspace> {
        self.workspaces.values()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    /// Active tab of a workspace
    pub fn active_tab(&self, workspace_id: &str) -> Option<&Tab> {
        self.workspaces
            .get(workspace_id)
            .and_then(|ws| ws.active_tab_id.as_deref())
            .and_then(|id| self.tabs.get(id))
    }

    /// Top-level tabs of a workspace ordered by position
    pub fn top_level(&self, workspace_id: &str) -> Vec<&Tab> {
        let mut tabs: Vec<&Tab> = self
            .tabs
            .values()
            .filter(|t| t.workspace_id == workspace_id && t.parent_id.is_none())
            .collect();
        tabs.sort_by_key(|t| t.position);
        tabs
    }

    /// Direct children of a group ordered by position
    pub fn children(&self, group_id: &str) -> Vec<&Tab> {
        let mut tabs: Vec<&Tab> = self
            .tabs
            .values()
            .filter(|t| t.parent_id.as_deref() == Some(group_id))
            .collect();
        tabs.sort_by_key(|t| t.position);
        tabs
    }

    /// Every tab of a workspace, parents before their children
    pub fn list(&self, workspace_id: &str) -> Vec<Tab> {
        let mut out = Vec::new();
        for tab in self.top_level(workspace_id) {
            self.collect_subtree(&tab.id, &mut out);
        }
        out
    }

    fn collect_subtree(&self, id: &str, out: &mut Vec<Tab>) {
        if let Some(tab) = self.tabs.get(id) {
            out.push(tab.clone());
            for child in self.children(id) {
                self.collect_subtree(&child.id, out);
            }
        }
    }

    /// Ids of every `Single` tab, across workspaces
    pub fn leaf_ids(&self) -> Vec<TabId> {
        self.tabs
            .values()
            .filter(|t| t.kind == TabKind::Single)
            .map(|t| t.id.clone())
            .collect()
    }

    /// Outermost enclosing tab (the tab itself when top-level)
    pub fn top_level_ancestor(&self, id: &str) -> Option<&Tab> {
        let mut current = self.tabs.get(id)?;
        while let Some(parent) = current.parent_id.as_deref() {
            current = self.tabs.get(parent)?;
        }
        Some(current)
    }

    // ========================================================================
    // Snapshot
    // ========================================================================

    pub fn to_snapshot(&self) -> TabTreeSnapshot {
        TabTreeSnapshot {
            workspaces: self.workspaces.values().cloned().collect(),
            tabs: self.tabs.values().cloned().collect(),
        }
    }

    /// Rebuild a tree from a snapshot, rejecting structurally invalid state
    pub fn from_snapshot(snapshot: TabTreeSnapshot) -> Result<Self, TabError> {
        let tree = Self {
            tabs: snapshot
                .tabs
                .into_iter()
                .map(|t| (t.id.clone(), t))
                .collect(),
            workspaces: snapshot
                .workspaces
                .into_iter()
                .map(|w| (w.id.clone(), w))
                .collect(),
        };
        tree.check_invariants()?;
        Ok(tree)
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    pub(super) fn new_id() -> TabId {
        uuid::Uuid::new_v4().to_string()
    }

    pub(super) fn require(&self, id: &str) -> Result<&Tab, TabError> {
        self.tabs
            .get(id)
            .ok_or_else(|| TabError::NotFound(id.to_string()))
    }

    pub(super) fn require_group(&self, id: &str) -> Result<&Tab, TabError> {
        let tab = self.require(id)?;
        if tab.kind != TabKind::Group {
            return Err(TabError::NotAGroup(id.to_string()));
        }
        Ok(tab)
    }

    pub(super) fn ensure_workspace(&mut self, workspace_id: &str) -> &mut Workspace {
        self.workspaces
            .entry(workspace_id.to_string())
            .or_insert_with(|| Workspace::new(workspace_id))
    }

    /// Build a tab record without inserting it
    pub(super) fn make_tab(
        workspace_id: &str,
        parent_id: Option<&str>,
        kind: TabKind,
        position: usize,
    ) -> Tab {
        Tab {
            id: Self::new_id(),
            workspace_id: workspace_id.to_string(),
            parent_id: parent_id.map(str::to_string),
            kind,
            title: String::new(),
            position,
            needs_attention: false,
            layout: None,
        }
    }

    /// Reassign contiguous positions to a workspace's top-level tabs,
    /// keeping their current relative order
    pub(super) fn renumber_top_level(&mut self, workspace_id: &str) {
        let ids: Vec<TabId> = self
            .top_level(workspace_id)
            .into_iter()
            .map(|t| t.id.clone())
            .collect();
        for (position, id) in ids.iter().enumerate() {
            if let Some(tab) = self.tabs.get_mut(id) {
                tab.position = position;
            }
        }
    }

    /// Reassign child positions from the group's layout traversal order
    pub(super) fn renumber_children(&mut self, group_id: &str) {
        let leaves = match self.tabs.get(group_id).and_then(|g| g.layout.as_ref()) {
            Some(layout) => layout.leaves(),
            None => return,
        };
        for (position, id) in leaves.iter().enumerate() {
            if let Some(tab) = self.tabs.get_mut(id) {
                tab.position = position;
            }
        }
    }
}
