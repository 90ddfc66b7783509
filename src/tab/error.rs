//! Typed errors for tab tree operations.

use termdeck_config::{TabId, WorkspaceId};
use thiserror::Error;

/// Rejections from [`TabTree`](super::TabTree) operations.
///
/// An operation that returns an error leaves the tree unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TabError {
    /// No tab with this id exists.
    #[error("tab not found: {0}")]
    NotFound(TabId),

    /// No workspace with this id exists.
    #[error("workspace not found: {0}")]
    WorkspaceNotFound(WorkspaceId),

    /// The operation needs a group tab.
    #[error("tab {0} is not a group")]
    NotAGroup(TabId),

    /// The operation only applies to top-level tabs.
    #[error("tab {0} is not a top-level tab")]
    NotTopLevel(TabId),

    /// A split was requested with no explicit target and no active tab.
    #[error("workspace {0} has no active tab to split")]
    NoActiveTab(WorkspaceId),

    /// A layout referenced ids that are not children of the group.
    #[error("invalid layout for group {group}: {reason}")]
    InvalidLayout { group: TabId, reason: String },

    /// A structural invariant does not hold (returned by validation).
    #[error("tab tree invariant violated: {0}")]
    InvariantViolation(String),
}
