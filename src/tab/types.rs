//! Records stored in the tab tree.

use super::history::TabHistory;
use super::layout::TabLayout;
use serde::{Deserialize, Serialize};
use termdeck_config::{TabId, WorkspaceId};

/// Whether a tab hosts one terminal or arranges other tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabKind {
    Single,
    Group,
}

/// A node of the tab tree.
///
/// A `Single` tab's id doubles as its pane id when it hosts a terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: TabId,
    pub workspace_id: WorkspaceId,
    /// Enclosing group, `None` for top-level tabs
    #[serde(default)]
    pub parent_id: Option<TabId>,
    pub kind: TabKind,
    #[serde(default)]
    pub title: String,
    /// Zero-based order among siblings
    pub position: usize,
    #[serde(default)]
    pub needs_attention: bool,
    /// Present exactly when `kind` is `Group`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<TabLayout>,
}

impl Tab {
    pub fn is_group(&self) -> bool {
        self.kind == TabKind::Group
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Per-UI-surface tab container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: WorkspaceId,
    #[serde(default)]
    pub active_tab_id: Option<TabId>,
    #[serde(default)]
    pub is_active: bool,
    /// Focus history, most recent first
    #[serde(default)]
    pub history: TabHistory,
}

impl Workspace {
    pub fn new(id: impl Into<WorkspaceId>) -> Self {
        Self {
            id: id.into(),
            active_tab_id: None,
            is_active: false,
            history: TabHistory::new(),
        }
    }
}

/// Field updates accepted by `TabTree::update`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub needs_attention: Option<bool>,
}

/// Side effects of a structural tab operation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabMutation {
    /// Tabs deleted by the operation, including dissolved groups
    pub removed: Vec<Tab>,
    /// Groups dissolved into their sole survivor: `(group, survivor)`
    pub replaced: Vec<(TabId, TabId)>,
}

impl TabMutation {
    pub fn removed_ids(&self) -> Vec<TabId> {
        self.removed.iter().map(|t| t.id.clone()).collect()
    }

    /// Pane ids whose sessions should be killed
    pub fn removed_panes(&self) -> Vec<TabId> {
        self.removed
            .iter()
            .filter(|t| t.kind == TabKind::Single)
            .map(|t| t.id.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.replaced.is_empty()
    }

    /// Where `id` ended up after group dissolution, if it was dissolved
    pub(super) fn replacement_for<'a>(&'a self, id: &'a str) -> &'a str {
        let mut current = id;
        while let Some((_, survivor)) = self.replaced.iter().find(|(group, _)| group == current) {
            current = survivor;
        }
        current
    }
}
