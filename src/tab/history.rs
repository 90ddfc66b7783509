//! Most-recently-focused ordering of tab ids for one workspace.

use serde::{Deserialize, Serialize};
use termdeck_config::TabId;

/// Front is the most recent focus. Each id appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabHistory {
    ids: Vec<TabId>,
}

impl TabHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `id` to the front, dropping any earlier occurrence
    pub fn push(&mut self, id: &str) {
        self.remove(id);
        self.ids.insert(0, id.to_string());
    }

    pub fn remove(&mut self, id: &str) {
        self.ids.retain(|existing| existing != id);
    }

    /// First id (most recent) for which `pred` holds
    pub fn most_recent<F>(&self, mut pred: F) -> Option<&TabId>
    where
        F: FnMut(&str) -> bool,
    {
        self.ids.iter().find(|id| pred(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TabId> {
        self.ids.iter()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
