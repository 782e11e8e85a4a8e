//! Editor configuration
//!
//! Read from `$XDG_CONFIG_HOME/gardenmap/config.json` (or
//! `~/.config/gardenmap/config.json`). Missing fields take their defaults and
//! a missing file means an all-default configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EditorError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Maximum number of undo steps kept
    pub max_history: usize,
    /// Capacity of the collaboration frame channel
    pub remote_buffer: usize,
    /// Delay before a date field edit is committed
    pub debounce_ms: u64,
    /// Identity used to recognise echoes of our own edits
    pub user_id: Option<String>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_history: 100,
            remote_buffer: 64,
            debounce_ms: 500,
            user_id: None,
        }
    }
}

impl EditorConfig {
    /// Load from the config directory, falling back to defaults when the
    /// file is missing or unreadable
    pub fn load() -> Self {
        let path = Self::config_path();
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, EditorError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), EditorError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".config")
            });
        config_dir.join("gardenmap").join("config.json")
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Configured user, or a fresh anonymous id for this session
    pub fn user_or_anonymous(&self) -> String {
        self.user_id
            .clone()
            .unwrap_or_else(|| format!("anon-{}", uuid::Uuid::new_v4()))
    }
}
