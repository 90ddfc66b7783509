//! Removal, layout replacement and active-tab fallback for TabTree

use super::TabTree;
use crate::tab::error::TabError;
use crate::tab::layout::{RemoveResult, TabLayout};
use crate::tab::types::{Tab, TabMutation};
use std::collections::HashSet;
use termdeck_config::TabId;

/// Where a removed tab sat, captured before the tree changes
#[derive(Debug, Default)]
pub(super) struct FocusContext {
    /// Former siblings in layout (or top-level) order
    pub(super) siblings: Vec<TabId>,
    pub(super) parent: Option<TabId>,
    /// Position of the removed tab's top-level ancestor
    pub(super) slot: usize,
}

impl TabTree {
    /// Remove a tab and, for groups, every descendant.
    ///
    /// A parent group left empty is deleted in turn; one left with a single
    /// child is dissolved and the survivor takes the group's place.
    pub fn remove(&mut self, id: &str) -> Result<TabMutation, TabError> {
        let tab = self.require(id)?.clone();
        let context = self.focus_context(&tab);

        crate::debug_info!("TAB_TREE", "remove called for tab {}", id);
        let mut mutation = TabMutation::default();
        self.delete_subtree(id, &mut mutation);
        match tab.parent_id.as_deref() {
            Some(parent) => self.detach_from_group(parent, id, &mut mutation),
            None => self.renumber_top_level(&tab.workspace_id),
        }
        self.settle_active(&tab.workspace_id, &context, &mutation);

        crate::debug_info!(
            "TAB_TREE",
            "Removed {} tab(s) for {}: {:?}",
            mutation.removed.len(),
            id,
            mutation.removed_ids()
        );
        Ok(mutation)
    }

    /// Replace a group's layout.
    ///
    /// `None` deletes the group. Every leaf of a new layout must already be a
    /// child of the group; children missing from it are deleted.
    pub fn update_layout(
        &mut self,
        group_id: &str,
        layout: Option<TabLayout>,
    ) -> Result<TabMutation, TabError> {
        let group = self.require_group(group_id)?.clone();
        let Some(layout) = layout else {
            return self.remove(group_id);
        };

        let leaves = layout.leaves();
        let mut seen = HashSet::new();
        for leaf in &leaves {
            if !seen.insert(leaf.as_str()) {
                return Err(TabError::InvalidLayout {
                    group: group_id.to_string(),
                    reason: format!("{} appears more than once", leaf),
                });
            }
            match self.tabs.get(leaf) {
                Some(tab) if tab.parent_id.as_deref() == Some(group_id) => {}
                _ => {
                    return Err(TabError::InvalidLayout {
                        group: group_id.to_string(),
                        reason: format!("{} is not a child of the group", leaf),
                    });
                }
            }
        }

        let dropped: Vec<TabId> = self
            .children(group_id)
            .into_iter()
            .filter(|t| !seen.contains(t.id.as_str()))
            .map(|t| t.id.clone())
            .collect();
        let context = FocusContext {
            siblings: leaves.clone(),
            parent: Some(group_id.to_string()),
            slot: self.top_level_ancestor(group_id).map_or(0, |t| t.position),
        };

        let mut mutation = TabMutation::default();
        for child in &dropped {
            self.delete_subtree(child, &mut mutation);
        }
        if let Some(group) = self.tabs.get_mut(group_id) {
            group.layout = Some(layout);
        }
        self.renumber_children(group_id);
        self.settle_active(&group.workspace_id, &context, &mutation);
        Ok(mutation)
    }

    pub(super) fn focus_context(&self, tab: &Tab) -> FocusContext {
        let siblings = match tab.parent_id.as_deref() {
            Some(parent) => self
                .tabs
                .get(parent)
                .and_then(|p| p.layout.as_ref())
                .map(|l| l.leaves())
                .unwrap_or_default(),
            None => self
                .top_level(&tab.workspace_id)
                .into_iter()
                .map(|t| t.id.clone())
                .collect(),
        };
        FocusContext {
            siblings: siblings.into_iter().filter(|s| *s != tab.id).collect(),
            parent: tab.parent_id.clone(),
            slot: self.top_level_ancestor(&tab.id).map_or(0, |t| t.position),
        }
    }

    /// Drop a tab and all its descendants from the map and focus history
    fn delete_subtree(&mut self, id: &str, mutation: &mut TabMutation) {
        let children: Vec<TabId> = self.children(id).iter().map(|t| t.id.clone()).collect();
        if let Some(tab) = self.tabs.remove(id) {
            if let Some(workspace) = self.workspaces.get_mut(&tab.workspace_id) {
                workspace.history.remove(id);
            }
            mutation.removed.push(tab);
        }
        for child in children {
            self.delete_subtree(&child, mutation);
        }
    }

    /// Take `child_id` out of a group's layout and collapse the group if needed
    fn detach_from_group(&mut self, group_id: &str, child_id: &str, mutation: &mut TabMutation) {
        let Some(group) = self.tabs.get_mut(group_id) else {
            return;
        };
        let Some(layout) = group.layout.take() else {
            log::warn!("Group {} has no layout while detaching {}", group_id, child_id);
            return;
        };

        match layout.remove_leaf(child_id) {
            RemoveResult::NotFound(layout) => {
                log::warn!("Tab {} missing from layout of group {}", child_id, group_id);
                group.layout = Some(layout);
            }
            RemoveResult::Removed(None) => self.delete_empty_group(group_id, mutation),
            RemoveResult::Removed(Some(TabLayout::Leaf(survivor))) => {
                self.dissolve_group(group_id, &survivor, mutation)
            }
            RemoveResult::Removed(Some(layout)) => {
                group.layout = Some(layout);
                self.renumber_children(group_id);
            }
        }
    }

    fn delete_empty_group(&mut self, group_id: &str, mutation: &mut TabMutation) {
        let Some(group) = self.tabs.remove(group_id) else {
            return;
        };
        if let Some(workspace) = self.workspaces.get_mut(&group.workspace_id) {
            workspace.history.remove(group_id);
        }
        crate::debug_info!("TAB_TREE", "Deleted empty group {}", group_id);

        let parent = group.parent_id.clone();
        let workspace_id = group.workspace_id.clone();
        mutation.removed.push(group);
        match parent {
            Some(parent) => self.detach_from_group(&parent, group_id, mutation),
            None => self.renumber_top_level(&workspace_id),
        }
    }

    /// Replace a group holding one child by that child
    fn dissolve_group(&mut self, group_id: &str, survivor: &str, mutation: &mut TabMutation) {
        let Some(group) = self.tabs.remove(group_id) else {
            return;
        };
        if let Some(workspace) = self.workspaces.get_mut(&group.workspace_id) {
            workspace.history.remove(group_id);
        }
        if let Some(tab) = self.tabs.get_mut(survivor) {
            tab.parent_id = group.parent_id.clone();
            tab.position = group.position;
        }

        match group.parent_id.as_deref() {
            Some(grandparent) => {
                if let Some(layout) = self
                    .tabs
                    .get_mut(grandparent)
                    .and_then(|g| g.layout.as_mut())
                {
                    layout.replace_leaf(group_id, TabLayout::leaf(survivor));
                }
                self.renumber_children(grandparent);
            }
            None => self.renumber_top_level(&group.workspace_id),
        }

        crate::debug_info!(
            "TAB_TREE",
            "Dissolved group {} into surviving child {}",
            group_id,
            survivor
        );
        mutation
            .replaced
            .push((group_id.to_string(), survivor.to_string()));
        mutation.removed.push(group);
    }

    /// Re-point the workspace's active tab if the mutation deleted it
    pub(super) fn settle_active(
        &mut self,
        workspace_id: &str,
        context: &FocusContext,
        mutation: &TabMutation,
    ) {
        let Some(active) = self
            .workspaces
            .get(workspace_id)
            .and_then(|w| w.active_tab_id.clone())
        else {
            return;
        };
        if self.tabs.contains_key(&active) {
            return;
        }

        let replacement = mutation.replacement_for(&active);
        let next = if replacement != active && self.tabs.contains_key(replacement) {
            Some(replacement.to_string())
        } else {
            self.fallback_active(workspace_id, context, mutation)
        };

        log::debug!(
            "Active tab {} removed from workspace {}, falling back to {:?}",
            active,
            workspace_id,
            next
        );
        if let Some(workspace) = self.workspaces.get_mut(workspace_id) {
            workspace.active_tab_id = next.clone();
            if let Some(id) = next.as_deref() {
                workspace.history.push(id);
            }
        }
    }

    fn fallback_active(
        &self,
        workspace_id: &str,
        context: &FocusContext,
        mutation: &TabMutation,
    ) -> Option<TabId> {
        let siblings: Vec<&str> = context
            .siblings
            .iter()
            .map(|s| mutation.replacement_for(s))
            .filter(|s| self.tabs.contains_key(*s))
            .collect();

        // Most recently focused sibling, then the first sibling in layout order
        let history = &self.workspaces.get(workspace_id)?.history;
        if let Some(id) = history.most_recent(|id| siblings.contains(&id)) {
            return Some(id.clone());
        }
        if let Some(id) = siblings.first() {
            return Some(id.to_string());
        }

        if let Some(parent) = context.parent.as_deref() {
            let parent = mutation.replacement_for(parent);
            if let Some(top) = self.top_level_ancestor(parent) {
                return Some(top.id.clone());
            }
        }

        let top = self.top_level(workspace_id);
        if top.is_empty() {
            return None;
        }
        Some(top[context.slot.min(top.len() - 1)].id.clone())
    }
}
