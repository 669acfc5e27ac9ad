//! Session bridge contract.
//!
//! The scheduler hands each step to a bridge that spawns one worker
//! session and resolves once that session's work is done. Implemented by
//! the session pool outside this crate, and by `DryRunBridge` here.

use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;

/// What the bridge needs to spawn a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpawnRequest {
    /// Working directory
    pub cwd: PathBuf,
    /// Session display name
    pub name: String,
    /// Interpolated prompt
    pub initial_prompt: String,
    /// Model hint
    pub model: Option<String>,
}

/// Why a spawn failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpawnError {
    #[error("session pool at capacity ({limit} sessions)")]
    AtCapacity { limit: usize },

    #[error("spawn rejected: {0}")]
    Rejected(String),

    #[error("session bridge panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Other(String),
}

/// Spawns one session per workflow step.
#[async_trait]
pub trait SessionBridge: Send + Sync {
    /// Spawn a session and wait for it to finish its step.
    async fn spawn_session(&self, request: SpawnRequest) -> Result<(), SpawnError>;
}

/// Bridge that records requests instead of spawning anything.
#[derive(Debug, Default)]
pub struct DryRunBridge {
    requests: Mutex<Vec<SpawnRequest>>,
}

impl DryRunBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<SpawnRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl SessionBridge for DryRunBridge {
    async fn spawn_session(&self, request: SpawnRequest) -> Result<(), SpawnError> {
        tracing::info!(
            name = %request.name,
            cwd = ?request.cwd,
            model = ?request.model,
            "Dry run: would spawn session"
        );
        self.requests.lock().push(request);
        Ok(())
    }
}
