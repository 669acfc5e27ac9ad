//! Observed mirror of the external session pool.
//!
//! The pool owns the processes; this registry only applies the events it
//! reports, refusing any status change the worker machine does not allow,
//! and derives operator notices from the transitions it accepts.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::machine::{validate_worker_transition, TransitionError};
use super::notifications::{Notification, NotificationAggregator, NotificationKind};
use super::status::SessionStatus;
use crate::core::{NotificationsConfig, SessionId};

/// A spawned agent work session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSession {
    /// Session ID
    pub id: SessionId,
    /// Display name
    pub name: String,
    /// Working directory
    pub cwd: PathBuf,
    /// Lifecycle status
    pub status: SessionStatus,
    /// When the session was spawned
    pub started_at: DateTime<Utc>,
    /// Last reported activity
    pub last_activity_at: DateTime<Utc>,
    /// Cumulative token usage
    #[serde(default)]
    pub tokens_used: u64,
}

impl WorkerSession {
    /// A freshly spawned session in `starting`.
    pub fn new(id: SessionId, name: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            cwd: cwd.into(),
            status: SessionStatus::Starting,
            started_at: now,
            last_activity_at: now,
            tokens_used: 0,
        }
    }

    /// Same session with a different status, bypassing the machine.
    ///
    /// For building snapshots of sessions whose history is not observed.
    #[must_use]
    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = status;
        self
    }
}

/// An event reported by the session pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Spawned { id: SessionId, name: String, cwd: PathBuf },
    StatusChanged { id: SessionId, status: SessionStatus },
    Activity { id: SessionId, tokens: u64 },
    Removed { id: SessionId },
}

/// Registry errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("unknown session: {0}")]
    UnknownSession(SessionId),

    #[error("session already registered: {0}")]
    DuplicateSession(SessionId),
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Tracks observed sessions and the notices derived from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRegistry {
    sessions: Vec<WorkerSession>,
    notifications: NotificationAggregator,
    include_completions: bool,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::from_config(&NotificationsConfig::default())
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &NotificationsConfig) -> Self {
        Self {
            sessions: Vec::new(),
            notifications: NotificationAggregator::with_max_per_session(config.max_per_session),
            include_completions: config.include_completions,
        }
    }

    /// Apply one pool event.
    ///
    /// A rejected event leaves the registry untouched.
    pub fn apply(&mut self, event: SessionEvent) -> RegistryResult<()> {
        match event {
            SessionEvent::Spawned { id, name, cwd } => {
                if self.get(&id).is_some() {
                    return Err(RegistryError::DuplicateSession(id));
                }
                tracing::debug!(session = %id, name = %name, "Session spawned");
                self.sessions.push(WorkerSession::new(id, name, cwd));
            }
            SessionEvent::StatusChanged { id, status } => self.change_status(&id, status)?,
            SessionEvent::Activity { id, tokens } => {
                let session = self.get_mut(&id)?;
                session.tokens_used = session.tokens_used.saturating_add(tokens);
                session.last_activity_at = Utc::now();
            }
            SessionEvent::Removed { id } => {
                let index = self
                    .sessions
                    .iter()
                    .position(|s| s.id == id)
                    .ok_or_else(|| RegistryError::UnknownSession(id.clone()))?;
                self.sessions.remove(index);
                self.notifications.clear_session(&id);
                tracing::debug!(session = %id, "Session removed");
            }
        }
        Ok(())
    }

    fn change_status(&mut self, id: &SessionId, to: SessionStatus) -> RegistryResult<()> {
        let include_completions = self.include_completions;
        let session = self.get_mut(id)?;
        let from = session.status;
        validate_worker_transition(from, to)?;

        session.status = to;
        session.last_activity_at = Utc::now();
        let name = session.name.clone();
        tracing::debug!(session = %id, from = %from, to = %to, "Session status changed");

        match from {
            SessionStatus::Approval => {
                self.notifications.dismiss(id, NotificationKind::ApprovalNeeded);
            }
            SessionStatus::Error => {
                self.notifications.dismiss(id, NotificationKind::Error);
            }
            _ => {}
        }

        match to {
            SessionStatus::Approval => self.notifications.push(Notification::new(
                id.clone(),
                NotificationKind::ApprovalNeeded,
                format!("{name} is waiting for approval"),
            )),
            SessionStatus::Error => self.notifications.push(Notification::new(
                id.clone(),
                NotificationKind::Error,
                format!("{name} reported an error"),
            )),
            SessionStatus::Idle if from == SessionStatus::Working && include_completions => {
                self.notifications.push(Notification::new(
                    id.clone(),
                    NotificationKind::Completed,
                    format!("{name} finished its task"),
                ));
            }
            SessionStatus::Working => {
                // New work supersedes the previous completion
                self.notifications.dismiss(id, NotificationKind::Completed);
            }
            SessionStatus::Shutdown => {
                self.notifications.clear_session(id);
            }
            _ => {}
        }
        Ok(())
    }

    pub fn get(&self, id: &SessionId) -> Option<&WorkerSession> {
        self.sessions.iter().find(|s| s.id == *id)
    }

    fn get_mut(&mut self, id: &SessionId) -> RegistryResult<&mut WorkerSession> {
        self.sessions
            .iter_mut()
            .find(|s| s.id == *id)
            .ok_or_else(|| RegistryError::UnknownSession(id.clone()))
    }

    /// Sessions in spawn order.
    pub fn sessions(&self) -> &[WorkerSession] {
        &self.sessions
    }

    pub fn notifications(&self) -> &NotificationAggregator {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut NotificationAggregator {
        &mut self.notifications
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
