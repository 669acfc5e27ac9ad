//! Configuration for Workdeck.
//!
//! Handles loading configuration from an explicit TOML file. Locating and
//! merging config files is left to the caller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Durable state settings
    pub state: StateConfig,

    /// Workflow discovery settings
    pub workflows: WorkflowsConfig,

    /// Notification aggregation settings
    pub notifications: NotificationsConfig,

    /// Dashboard model settings
    pub dashboard: DashboardConfig,
}

/// Durable state settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Path of the persisted state document
    pub path: PathBuf,

    /// Maximum number of per-commit snapshots kept in history
    pub max_history: usize,

    /// Maximum number of labelled snapshots kept apart from history
    pub max_checkpoints: usize,

    /// Default advisory lock lifetime in seconds
    pub lock_ttl_secs: u64,
}

/// Workflow discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowsConfig {
    /// Directories scanned for workflow definitions, highest priority first
    pub dirs: Vec<String>,
}

/// Notification aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Upper bound on live notices per session (one per kind at most)
    pub max_per_session: usize,

    /// Whether `working -> idle` transitions raise a completion notice
    pub include_completions: bool,
}

/// Dashboard model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Whether unlinked sessions and pull requests are listed
    pub show_unlinked: bool,
}

impl Config {
    /// Load configuration from a specific file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("workdeck"))
    }

    /// Get the data directory path (for state, WAL, snapshots).
    pub fn data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("workdeck"))
    }
}

impl StateConfig {
    /// Lock lifetime as a `Duration`.
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }
}

impl WorkflowsConfig {
    /// Discovery directories with `~` and environment variables expanded.
    ///
    /// Entries that fail to expand are kept verbatim.
    pub fn resolved_dirs(&self) -> Vec<PathBuf> {
        self.dirs
            .iter()
            .map(|dir| match shellexpand::full(dir) {
                Ok(expanded) => PathBuf::from(expanded.as_ref()),
                Err(e) => {
                    tracing::warn!(dir = %dir, error = %e, "Failed to expand workflow directory");
                    PathBuf::from(dir)
                }
            })
            .collect()
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        let path = Config::data_dir()
            .unwrap_or_else(|| PathBuf::from(".workdeck"))
            .join("state.json");
        Self { path, max_history: 50, max_checkpoints: 20, lock_ttl_secs: 30 }
    }
}

impl Default for WorkflowsConfig {
    fn default() -> Self {
        let mut dirs = vec![".workdeck/workflows".to_string()];
        if let Some(config_dir) = Config::config_dir() {
            dirs.push(config_dir.join("workflows").to_string_lossy().into_owned());
        }
        Self { dirs }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { max_per_session: 3, include_completions: true }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self { show_unlinked: true }
    }
}
