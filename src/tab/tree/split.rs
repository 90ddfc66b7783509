//! Split and ungroup operations for TabTree

use super::TabTree;
use crate::tab::error::TabError;
use crate::tab::layout::{DEFAULT_SPLIT_PERCENTAGE, SplitDirection, TabLayout};
use crate::tab::types::{Tab, TabKind, TabMutation};
use termdeck_config::TabId;

impl TabTree {
    /// Split side by side. See [`split`](Self::split).
    pub fn split_vertical(
        &mut self,
        workspace_id: &str,
        target: Option<&str>,
    ) -> Result<Tab, TabError> {
        self.split(workspace_id, target, SplitDirection::Row)
    }

    /// Split stacked. See [`split`](Self::split).
    pub fn split_horizontal(
        &mut self,
        workspace_id: &str,
        target: Option<&str>,
    ) -> Result<Tab, TabError> {
        self.split(workspace_id, target, SplitDirection::Column)
    }

    /// Split the focused leaf of `target` (default: the active tab).
    ///
    /// A leaf inside a group gets a nested split in the group's layout. A
    /// top-level `Single` is promoted: a new group takes its slot and holds
    /// the original tab and the new one. The top-level tab holding the new
    /// tab becomes active and the new tab is recorded as focused within it.
    pub fn split(
        &mut self,
        workspace_id: &str,
        target: Option<&str>,
        direction: SplitDirection,
    ) -> Result<Tab, TabError> {
        let target = match target {
            Some(id) => self.require(id)?.id.clone(),
            None => self
                .workspaces
                .get(workspace_id)
                .and_then(|w| w.active_tab_id.clone())
                .ok_or_else(|| TabError::NoActiveTab(workspace_id.to_string()))?,
        };
        let leaf = self
            .focused_leaf(&target)
            .ok_or_else(|| TabError::NotFound(target.clone()))?;
        let leaf_tab = self.require(&leaf)?.clone();
        let workspace_id = leaf_tab.workspace_id.clone();

        let new_id = match leaf_tab.parent_id.as_deref() {
            Some(group_id) => self.split_in_group(group_id, &leaf, direction)?,
            None => self.promote_to_group(&leaf_tab, direction),
        };

        let top = self
            .top_level_ancestor(&new_id)
            .map(|t| t.id.clone())
            .ok_or_else(|| TabError::NotFound(new_id.clone()))?;
        self.ensure_workspace(&workspace_id).history.push(&new_id);
        self.set_active(&top)?;

        crate::debug_info!(
            "TAB_TREE",
            "Split {} {:?}: new tab {}, active {}",
            leaf,
            direction,
            new_id,
            top
        );
        self.require(&new_id).cloned()
    }

    fn split_in_group(
        &mut self,
        group_id: &str,
        leaf: &str,
        direction: SplitDirection,
    ) -> Result<TabId, TabError> {
        let workspace_id = self.require_group(group_id)?.workspace_id.clone();
        let new_tab = Self::make_tab(&workspace_id, Some(group_id), TabKind::Single, 0);

        let split = self
            .tabs
            .get_mut(group_id)
            .and_then(|g| g.layout.as_mut())
            .is_some_and(|layout| layout.split_leaf(leaf, direction, &new_tab.id));
        if !split {
            return Err(TabError::InvariantViolation(format!(
                "{} is not in the layout of its group {}",
                leaf, group_id
            )));
        }

        let new_id = new_tab.id.clone();
        self.tabs.insert(new_id.clone(), new_tab);
        self.renumber_children(group_id);
        Ok(new_id)
    }

    fn promote_to_group(&mut self, original: &Tab, direction: SplitDirection) -> TabId {
        let mut group = Self::make_tab(
            &original.workspace_id,
            None,
            TabKind::Group,
            original.position,
        );
        let new_tab = Self::make_tab(&original.workspace_id, Some(&group.id), TabKind::Single, 1);
        group.layout = Some(TabLayout::split(
            direction,
            TabLayout::leaf(original.id.clone()),
            TabLayout::leaf(new_tab.id.clone()),
            DEFAULT_SPLIT_PERCENTAGE,
        ));
        if let Some(tab) = self.tabs.get_mut(&original.id) {
            tab.parent_id = Some(group.id.clone());
            tab.position = 0;
        }

        log::debug!("Promoted tab {} into new group {}", original.id, group.id);
        let new_id = new_tab.id.clone();
        self.tabs.insert(group.id.clone(), group);
        self.tabs.insert(new_id.clone(), new_tab);
        new_id
    }

    /// Leaf a split of `id` would act on.
    ///
    /// Groups resolve to their most recently focused child still in the
    /// layout, else the first leaf, descending through nested groups.
    pub fn focused_leaf(&self, id: &str) -> Option<TabId> {
        let mut current = self.tabs.get(id)?;
        // Bounded by the tab count so a corrupt cycle cannot spin forever
        for _ in 0..=self.tabs.len() {
            let Some(layout) = current.layout.as_ref() else {
                return Some(current.id.clone());
            };
            let next = self
                .workspaces
                .get(&current.workspace_id)
                .and_then(|w| w.history.most_recent(|h| layout.contains(h)))
                .unwrap_or_else(|| layout.first_leaf());
            current = self.tabs.get(next)?;
        }
        None
    }

    /// Dissolve a group, keeping its children.
    ///
    /// Children of a top-level group become top-level tabs in the group's
    /// slot, in layout order. Children of a nested group move into the
    /// enclosing group with the nested layout spliced in place.
    pub fn ungroup(&mut self, group_id: &str) -> Result<TabMutation, TabError> {
        let group = self.require_group(group_id)?.clone();
        let children = group
            .layout
            .as_ref()
            .map(|l| l.leaves())
            .unwrap_or_default();
        let successor = self
            .workspaces
            .get(&group.workspace_id)
            .and_then(|w| w.history.most_recent(|h| children.iter().any(|c| c == h)))
            .cloned()
            .or_else(|| children.first().cloned());

        self.tabs.remove(group_id);
        if let Some(workspace) = self.workspaces.get_mut(&group.workspace_id) {
            workspace.history.remove(group_id);
        }

        match group.parent_id.as_deref() {
            None => {
                let mut order: Vec<TabId> = self
                    .top_level(&group.workspace_id)
                    .into_iter()
                    .map(|t| t.id.clone())
                    .collect();
                let at = group.position.min(order.len());
                order.splice(at..at, children.iter().cloned());
                for (position, id) in order.iter().enumerate() {
                    if let Some(tab) = self.tabs.get_mut(id) {
                        tab.parent_id = None;
                        tab.position = position;
                    }
                }
            }
            Some(parent) => {
                for child in &children {
                    if let Some(tab) = self.tabs.get_mut(child) {
                        tab.parent_id = Some(parent.to_string());
                    }
                }
                if let (Some(layout), Some(nested)) = (
                    self.tabs.get_mut(parent).and_then(|p| p.layout.as_mut()),
                    group.layout.clone(),
                ) {
                    layout.replace_leaf(group_id, nested);
                }
                self.renumber_children(parent);
            }
        }

        if let Some(workspace) = self.workspaces.get_mut(&group.workspace_id)
            && workspace.active_tab_id.as_deref() == Some(group_id)
        {
            workspace.active_tab_id = successor.clone();
            if let Some(id) = successor.as_deref() {
                workspace.history.push(id);
            }
        }

        log::debug!(
            "Ungrouped {} into {} tab(s)",
            group_id,
            children.len()
        );
        Ok(TabMutation {
            removed: vec![group],
            replaced: Vec::new(),
        })
    }
}
