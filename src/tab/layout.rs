//! `TabLayout`: binary split tree of a group tab's children.

use serde::{Deserialize, Serialize};
use termdeck_config::TabId;

/// Smallest share either side of a split may get, in percent
const MIN_SPLIT_PERCENTAGE: f32 = 5.0;

/// Default share of the first child of a new split
pub const DEFAULT_SPLIT_PERCENTAGE: f32 = 50.0;

/// Axis along which a split arranges its two children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitDirection {
    /// Side by side (produced by a vertical split)
    Row,
    /// Stacked (produced by a horizontal split)
    Column,
}

/// Layout of a group tab.
///
/// Serializes as either a bare child id (`"A"`) or a split object, so
/// persisted state and IPC payloads read the same way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TabLayout {
    /// A single child tab
    Leaf(TabId),
    /// Two sub-layouts
    Split {
        direction: SplitDirection,
        first: Box<TabLayout>,
        second: Box<TabLayout>,
        /// Share of the first child, in percent
        #[serde(rename = "splitPercentage")]
        split_percentage: f32,
    },
}

/// Outcome of removing a leaf from a layout
#[derive(Debug)]
pub enum RemoveResult {
    /// The leaf was removed; `None` means nothing is left
    Removed(Option<TabLayout>),
    /// The leaf was not present; the layout is handed back untouched
    NotFound(TabLayout),
}

impl TabLayout {
    pub fn leaf(id: impl Into<TabId>) -> Self {
        TabLayout::Leaf(id.into())
    }

    /// Create a split node, clamping the percentage to keep both sides visible
    pub fn split(
        direction: SplitDirection,
        first: TabLayout,
        second: TabLayout,
        split_percentage: f32,
    ) -> Self {
        TabLayout::Split {
            direction,
            first: Box::new(first),
            second: Box::new(second),
            split_percentage: split_percentage
                .clamp(MIN_SPLIT_PERCENTAGE, 100.0 - MIN_SPLIT_PERCENTAGE),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, TabLayout::Leaf(_))
    }

    /// All leaf ids in traversal order (left/top first)
    pub fn leaves(&self) -> Vec<TabId> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves(&self, out: &mut Vec<TabId>) {
        match self {
            TabLayout::Leaf(id) => out.push(id.clone()),
            TabLayout::Split { first, second, .. } => {
                first.collect_leaves(out);
                second.collect_leaves(out);
            }
        }
    }

    /// Left/top-most leaf
    pub fn first_leaf(&self) -> &TabId {
        match self {
            TabLayout::Leaf(id) => id,
            TabLayout::Split { first, .. } => first.first_leaf(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.count_leaf(id) > 0
    }

    /// How many times `id` appears as a leaf
    pub fn count_leaf(&self, id: &str) -> usize {
        match self {
            TabLayout::Leaf(leaf) => usize::from(leaf == id),
            TabLayout::Split { first, second, .. } => first.count_leaf(id) + second.count_leaf(id),
        }
    }

    /// Remove a leaf, collapsing the split that held it into its sibling
    pub fn remove_leaf(self, target: &str) -> RemoveResult {
        match self {
            TabLayout::Leaf(id) => {
                if id == target {
                    RemoveResult::Removed(None)
                } else {
                    RemoveResult::NotFound(TabLayout::Leaf(id))
                }
            }
            TabLayout::Split {
                direction,
                first,
                second,
                split_percentage,
            } => match first.remove_leaf(target) {
                // First child was the target; the split collapses to the second
                RemoveResult::Removed(None) => RemoveResult::Removed(Some(*second)),
                RemoveResult::Removed(Some(new_first)) => RemoveResult::Removed(Some(TabLayout::Split {
                    direction,
                    first: Box::new(new_first),
                    second,
                    split_percentage,
                })),
                RemoveResult::NotFound(first_node) => match second.remove_leaf(target) {
                    RemoveResult::Removed(None) => RemoveResult::Removed(Some(first_node)),
                    RemoveResult::Removed(Some(new_second)) => {
                        RemoveResult::Removed(Some(TabLayout::Split {
                            direction,
                            first: Box::new(first_node),
                            second: Box::new(new_second),
                            split_percentage,
                        }))
                    }
                    RemoveResult::NotFound(second_node) => RemoveResult::NotFound(TabLayout::Split {
                        direction,
                        first: Box::new(first_node),
                        second: Box::new(second_node),
                        split_percentage,
                    }),
                },
            },
        }
    }

    /// Replace the leaf `target` with `replacement`. Returns false if absent.
    pub fn replace_leaf(&mut self, target: &str, replacement: TabLayout) -> bool {
        let mut replacement = Some(replacement);
        self.replace_leaf_inner(target, &mut replacement)
    }

    fn replace_leaf_inner(&mut self, target: &str, replacement: &mut Option<TabLayout>) -> bool {
        match self {
            TabLayout::Leaf(id) if id == target => match replacement.take() {
                Some(node) => {
                    *self = node;
                    true
                }
                None => false,
            },
            TabLayout::Leaf(_) => false,
            TabLayout::Split { first, second, .. } => {
                first.replace_leaf_inner(target, replacement)
                    || second.replace_leaf_inner(target, replacement)
            }
        }
    }

    /// Turn the leaf `target` into a split of `target` and `new_id`
    pub fn split_leaf(&mut self, target: &str, direction: SplitDirection, new_id: &str) -> bool {
        let node = TabLayout::split(
            direction,
            TabLayout::leaf(target),
            TabLayout::leaf(new_id),
            DEFAULT_SPLIT_PERCENTAGE,
        );
        self.replace_leaf(target, node)
    }
}
