//! Structural validation for TabTree

use super::TabTree;
use crate::tab::error::TabError;
use crate::tab::types::TabKind;
use std::collections::BTreeMap;

fn violation(message: String) -> Result<(), TabError> {
    Err(TabError::InvariantViolation(message))
}

impl TabTree {
    /// Verify every structural invariant of the tree.
    ///
    /// - Every group's layout references only existing tabs whose parent is
    ///   that group, and every child of a group appears in its layout
    ///   exactly once (and in no other layout).
    /// - `Single` tabs carry no layout, groups always carry one.
    /// - Sibling positions are `0..n` within each parent scope.
    /// - A workspace's active tab exists and belongs to it.
    pub fn check_invariants(&self) -> Result<(), TabError> {
        for tab in self.tabs.values() {
            match (tab.kind, &tab.layout) {
                (TabKind::Single, Some(_)) => {
                    return violation(format!("single tab {} has a layout", tab.id));
                }
                (TabKind::Group, None) => {
                    return violation(format!("group {} has no layout", tab.id));
                }
                (TabKind::Group, Some(layout)) => {
                    for leaf in layout.leaves() {
                        let Some(child) = self.tabs.get(&leaf) else {
                            return violation(format!(
                                "layout of {} references missing tab {}",
                                tab.id, leaf
                            ));
                        };
                        if child.parent_id.as_deref() != Some(tab.id.as_str()) {
                            return violation(format!(
                                "layout of {} references {} whose parent is {:?}",
                                tab.id, leaf, child.parent_id
                            ));
                        }
                    }
                }
                (TabKind::Single, None) => {}
            }

            if !self.workspaces.contains_key(&tab.workspace_id) {
                return violation(format!(
                    "tab {} belongs to unknown workspace {}",
                    tab.id, tab.workspace_id
                ));
            }

            if let Some(parent_id) = tab.parent_id.as_deref() {
                let Some(parent) = self.tabs.get(parent_id) else {
                    return violation(format!("tab {} has missing parent {}", tab.id, parent_id));
                };
                if parent.workspace_id != tab.workspace_id {
                    return violation(format!(
                        "tab {} and its parent {} are in different workspaces",
                        tab.id, parent_id
                    ));
                }
                let occurrences: usize = self
                    .tabs
                    .values()
                    .filter_map(|t| t.layout.as_ref())
                    .map(|l| l.count_leaf(&tab.id))
                    .sum();
                let in_parent = parent.layout.as_ref().map_or(0, |l| l.count_leaf(&tab.id));
                if in_parent != 1 || occurrences != 1 {
                    return violation(format!(
                        "tab {} appears {} time(s) in its parent layout and {} time(s) overall",
                        tab.id, in_parent, occurrences
                    ));
                }
            }
        }

        let mut scopes: BTreeMap<(&str, Option<&str>), Vec<usize>> = BTreeMap::new();
        for tab in self.tabs.values() {
            scopes
                .entry((tab.workspace_id.as_str(), tab.parent_id.as_deref()))
                .or_default()
                .push(tab.position);
        }
        for ((workspace, parent), mut positions) in scopes {
            positions.sort_unstable();
            if positions.iter().enumerate().any(|(i, p)| i != *p) {
                return violation(format!(
                    "positions under {:?} in workspace {} are not contiguous: {:?}",
                    parent, workspace, positions
                ));
            }
        }

        for workspace in self.workspaces.values() {
            if let Some(active) = workspace.active_tab_id.as_deref() {
                match self.tabs.get(active) {
                    Some(tab) if tab.workspace_id == workspace.id => {}
                    _ => {
                        return violation(format!(
                            "active tab {} of workspace {} does not exist there",
                            active, workspace.id
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}
