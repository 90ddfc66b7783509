//! Tab creation, updates, activation and reordering for TabTree

use super::TabTree;
use crate::tab::error::TabError;
use crate::tab::layout::{DEFAULT_SPLIT_PERCENTAGE, SplitDirection, TabLayout};
use crate::tab::types::{Tab, TabKind, TabPatch};

impl TabTree {
    /// Create a top-level tab at the end of a workspace.
    ///
    /// The workspace is created on first use and the new tab becomes its
    /// active tab. A new group starts with one fresh `Single` child as its
    /// whole layout.
    pub fn create(&mut self, workspace_id: &str, kind: TabKind) -> Tab {
        self.ensure_workspace(workspace_id);
        let position = self.top_level(workspace_id).len();
        let tab = self.insert_new(workspace_id, None, kind, position);

        let workspace = self.ensure_workspace(workspace_id);
        workspace.active_tab_id = Some(tab.id.clone());
        workspace.is_active = true;
        workspace.history.push(&tab.id);
        log::debug!(
            "Created {:?} tab {} in workspace {} at position {}",
            kind,
            tab.id,
            workspace_id,
            position
        );
        tab
    }

    /// Append a new child to a group, splitting the group's current layout
    /// with the new leaf on the right at 50%.
    pub fn add_child_tab(&mut self, group_id: &str, kind: TabKind) -> Result<Tab, TabError> {
        let group = self.require_group(group_id)?;
        let workspace_id = group.workspace_id.clone();
        let position = group.layout.as_ref().map_or(0, |l| l.leaves().len());

        let child = self.insert_new(&workspace_id, Some(group_id), kind, position);
        if let Some(group) = self.tabs.get_mut(group_id) {
            let leaf = TabLayout::leaf(child.id.clone());
            group.layout = Some(match group.layout.take() {
                Some(existing) => TabLayout::split(
                    SplitDirection::Row,
                    existing,
                    leaf,
                    DEFAULT_SPLIT_PERCENTAGE,
                ),
                None => leaf,
            });
        }
        self.renumber_children(group_id);

        crate::debug_info!(
            "TAB_TREE",
            "Added child {} ({:?}) to group {}",
            child.id,
            kind,
            group_id
        );
        Ok(self.tabs.get(&child.id).cloned().unwrap_or(child))
    }

    /// Insert a tab record; groups get their initial `Single` child
    fn insert_new(
        &mut self,
        workspace_id: &str,
        parent_id: Option<&str>,
        kind: TabKind,
        position: usize,
    ) -> Tab {
        let mut tab = Self::make_tab(workspace_id, parent_id, kind, position);
        if kind == TabKind::Group {
            let child = Self::make_tab(workspace_id, Some(&tab.id), TabKind::Single, 0);
            tab.layout = Some(TabLayout::leaf(child.id.clone()));
            self.tabs.insert(child.id.clone(), child);
        }
        self.tabs.insert(tab.id.clone(), tab.clone());
        tab
    }

    /// Apply a field patch to a tab
    pub fn update(&mut self, id: &str, patch: TabPatch) -> Result<Tab, TabError> {
        let tab = self
            .tabs
            .get_mut(id)
            .ok_or_else(|| TabError::NotFound(id.to_string()))?;
        if let Some(title) = patch.title {
            tab.title = title;
        }
        if let Some(needs_attention) = patch.needs_attention {
            tab.needs_attention = needs_attention;
        }
        Ok(tab.clone())
    }

    /// Make a tab its workspace's active tab.
    ///
    /// Clears the tab's attention flag, marks the workspace active and moves
    /// the tab to the front of the focus history.
    pub fn set_active(&mut self, id: &str) -> Result<(), TabError> {
        let tab = self
            .tabs
            .get_mut(id)
            .ok_or_else(|| TabError::NotFound(id.to_string()))?;
        tab.needs_attention = false;
        let workspace_id = tab.workspace_id.clone();

        let workspace = self.ensure_workspace(&workspace_id);
        workspace.active_tab_id = Some(id.to_string());
        workspace.is_active = true;
        workspace.history.push(id);
        Ok(())
    }

    /// Move a top-level tab to `target_position`, clamped to the valid range
    pub fn reorder(&mut self, id: &str, target_position: usize) -> Result<(), TabError> {
        let tab = self.require(id)?;
        if !tab.is_top_level() {
            return Err(TabError::NotTopLevel(id.to_string()));
        }
        let workspace_id = tab.workspace_id.clone();

        let mut order: Vec<String> = self
            .top_level(&workspace_id)
            .into_iter()
            .map(|t| t.id.clone())
            .collect();
        let Some(current) = order.iter().position(|t| t == id) else {
            return Err(TabError::NotFound(id.to_string()));
        };
        let target = target_position.min(order.len() - 1);
        if current == target {
            return Ok(());
        }

        let moved = order.remove(current);
        order.insert(target, moved);
        for (position, tab_id) in order.iter().enumerate() {
            if let Some(tab) = self.tabs.get_mut(tab_id) {
                tab.position = position;
            }
        }
        log::debug!("Moved tab {} from position {} to {}", id, current, target);
        Ok(())
    }
}
