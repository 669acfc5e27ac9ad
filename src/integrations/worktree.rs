//! Worktree snapshots.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// An isolated filesystem checkout of a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worktree {
    /// Checkout root
    pub path: PathBuf,
    /// Checked-out branch (`None` for a detached HEAD)
    #[serde(default)]
    pub branch: Option<String>,
    /// Uncommitted changes present
    #[serde(default)]
    pub dirty: bool,
}

impl Worktree {
    pub fn new(path: impl Into<PathBuf>, branch: impl Into<String>) -> Self {
        Self { path: path.into(), branch: Some(branch.into()), dirty: false }
    }

    /// Whether `dir` is this worktree's root or lies beneath it.
    ///
    /// Compared component-wise, so `/src/app-2` is not inside `/src/app`.
    pub fn contains(&self, dir: &Path) -> bool {
        dir.starts_with(&self.path)
    }
}
