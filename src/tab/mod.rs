//! Tab tree for workspaces of terminal tabs
//!
//! This module provides:
//! - `TabTree`: Workspaces, top-level tabs and split groups with focus history
//! - `TabLayout`: Binary split layout of a group's children
//! - `TabController`: Shared, persisted tree that also tears down sessions
//! - `KeyValueStore` / `FileStore`: Storage for the serialized tree

mod controller;
mod error;
mod history;
mod layout;
mod persistence;
mod tree;
mod types;

pub use controller::TabController;
pub use error::TabError;
pub use history::TabHistory;
pub use layout::{DEFAULT_SPLIT_PERCENTAGE, RemoveResult, SplitDirection, TabLayout};
pub use persistence::{FileStore, KeyValueStore, TAB_TREE_KEY, load_tree, save_tree};
pub use tree::{TabTree, TabTreeSnapshot};
pub use types::{Tab, TabKind, TabMutation, TabPatch, Workspace};
