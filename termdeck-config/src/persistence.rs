//! Config persistence and path resolution for `Config`.
//!
//! Covers:
//! - `load` / `save` (YAML file I/O with atomic write)
//! - XDG-compliant path helpers (`config_path`, `config_dir`, `state_dir`, `socket_path`)
//! - Runtime helpers (`resolve_tmux_path`, `expand_home_dir`)

use crate::config::Config;
use crate::error::ConfigError;
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "termdeck";

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, writing a default file there if none exists
    pub fn load_from(path: &Path) -> Result<Self> {
        log::info!("Config path: {:?}", path);

        if path.exists() {
            log::info!("Loading existing config from {:?}", path);
            let contents = fs::read_to_string(path).map_err(ConfigError::from)?;
            let config: Config = if contents.trim().is_empty() {
                Self::default()
            } else {
                serde_yaml_ng::from_str(&contents).map_err(ConfigError::from)?
            };
            config.validate()?;
            Ok(config)
        } else {
            log::info!("Config file not found, creating default at {:?}", path);
            let config = Self::default();
            if let Err(e) = config.save_to(path) {
                log::error!("Failed to save default config: {}", e);
                return Err(e);
            }
            Ok(config)
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::from)?;
        }

        let yaml = serde_yaml_ng::to_string(self).map_err(ConfigError::from)?;

        // Atomic save: write to temp file then rename to prevent corruption on crash
        let temp_path = path.with_extension("yaml.tmp");
        fs::write(&temp_path, &yaml).map_err(ConfigError::from)?;
        fs::rename(&temp_path, path).map_err(ConfigError::from)?;

        Ok(())
    }

    /// Get the configuration file path (using XDG convention)
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.yaml")
    }

    /// Get the configuration directory path (using XDG convention)
    pub fn config_dir() -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            if let Some(config_dir) = dirs::config_dir() {
                config_dir.join(APP_DIR)
            } else {
                PathBuf::from(".")
            }
        }
        #[cfg(not(target_os = "windows"))]
        {
            // ~/.config/termdeck on every Unix, macOS included
            if let Some(home_dir) = dirs::home_dir() {
                home_dir.join(".config").join(APP_DIR)
            } else {
                PathBuf::from(".")
            }
        }
    }

    /// Directory holding persisted tab state
    pub fn state_dir(&self) -> PathBuf {
        match &self.state_dir {
            Some(dir) => PathBuf::from(Self::expand_home_dir(dir)),
            None => Self::config_dir().join("state"),
        }
    }

    /// Unix socket path of the IPC bridge
    pub fn socket_path(&self) -> PathBuf {
        if let Some(path) = &self.socket_path {
            return PathBuf::from(Self::expand_home_dir(path));
        }
        dirs::runtime_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(format!("{APP_DIR}.sock"))
    }

    /// Expand a leading `~/` to the user's home directory
    pub fn expand_home_dir(path: &str) -> String {
        if let Some(rest) = path.strip_prefix("~/")
            && let Some(home) = dirs::home_dir()
        {
            return home.join(rest).to_string_lossy().to_string();
        }
        path.to_string()
    }

    /// Resolve the tmux executable path at runtime.
    /// If the configured path is absolute and exists, use it.
    /// If it's "tmux" (the default), search PATH and common installation locations.
    pub fn resolve_tmux_path(&self) -> String {
        let configured = &self.tmux.tmux_path;

        if configured.starts_with('/') && Path::new(configured).exists() {
            return configured.clone();
        }

        // Anything other than the bare default is left for the OS to resolve
        if configured != "tmux" {
            return configured.clone();
        }

        if let Ok(path_env) = std::env::var("PATH") {
            for dir in std::env::split_paths(&path_env) {
                let candidate = dir.join("tmux");
                if candidate.exists() {
                    return candidate.to_string_lossy().to_string();
                }
            }
        }

        // PATH may be incomplete when launched from a desktop session
        let fallback_paths = [
            "/opt/homebrew/bin/tmux",
            "/usr/local/bin/tmux",
            "/usr/bin/tmux",
            "/snap/bin/tmux",
        ];
        for path in fallback_paths {
            if Path::new(path).exists() {
                return path.to_string();
            }
        }

        configured.clone()
    }
}
