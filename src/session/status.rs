//! Status vocabularies for worker sessions and specs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a worker session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Starting,
    Idle,
    Working,
    Approval,
    Error,
    Shutdown,
}

impl SessionStatus {
    pub const ALL: [Self; 6] =
        [Self::Starting, Self::Idle, Self::Working, Self::Approval, Self::Error, Self::Shutdown];

    pub fn name(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Idle => "idle",
            Self::Working => "working",
            Self::Approval => "approval",
            Self::Error => "error",
            Self::Shutdown => "shutdown",
        }
    }

    /// Shutdown is terminal.
    pub fn is_terminal(self) -> bool {
        self == Self::Shutdown
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Review status of a spec document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecStatus {
    Draft,
    Pending,
    Approved,
    Denied,
}

impl SpecStatus {
    pub const ALL: [Self; 4] = [Self::Draft, Self::Pending, Self::Approved, Self::Denied];

    pub fn name(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
        }
    }
}

impl fmt::Display for SpecStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
