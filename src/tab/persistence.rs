//! Key/value persistence for the tab tree
//!
//! The tree is stored as one YAML document under [`TAB_TREE_KEY`]. The
//! default store keeps one file per key in the state directory
//! (`~/.config/termdeck/state/` unless configured otherwise).

use super::tree::{TabTree, TabTreeSnapshot};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Key holding the serialized tab tree
pub const TAB_TREE_KEY: &str = "tabs";

/// Minimal string key/value store
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
}

/// One `<key>.yaml` file per key under a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.yaml", safe))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        Ok(Some(contents))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create state directory {:?}", self.dir))?;

        // Write to a sibling temp file, then rename into place
        let path = self.path_for(key);
        let temp_path = path.with_extension("yaml.tmp");
        std::fs::write(&temp_path, value)
            .with_context(|| format!("Failed to write {:?}", temp_path))?;
        std::fs::rename(&temp_path, &path)
            .with_context(|| format!("Failed to move {:?} into place", temp_path))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            std::fs::remove_file(&path).with_context(|| format!("Failed to remove {:?}", path))?;
        }
        Ok(())
    }
}

/// Persist the whole tree
pub fn save_tree(store: &dyn KeyValueStore, tree: &TabTree) -> Result<()> {
    let contents = serde_yaml_ng::to_string(&tree.to_snapshot())
        .context("Failed to serialize tab tree")?;
    store.set(TAB_TREE_KEY, &contents)?;
    log::debug!("Saved tab tree ({} tabs)", tree.len());
    Ok(())
}

/// Load the persisted tree.
///
/// Returns `None` when nothing is stored. Corrupt or structurally invalid
/// state is an error.
pub fn load_tree(store: &dyn KeyValueStore) -> Result<Option<TabTree>> {
    let Some(contents) = store.get(TAB_TREE_KEY)? else {
        return Ok(None);
    };
    if contents.trim().is_empty() {
        return Ok(None);
    }
    let snapshot: TabTreeSnapshot =
        serde_yaml_ng::from_str(&contents).context("Failed to parse persisted tab tree")?;
    let tree = TabTree::from_snapshot(snapshot).context("Persisted tab tree is inconsistent")?;
    log::info!("Loaded tab tree ({} tabs)", tree.len());
    Ok(Some(tree))
}
