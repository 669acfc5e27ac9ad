//! Issue tracker contract.
//!
//! Typed view of issues as fetched from the tracker, plus the client trait
//! the dashboard refresh cycle consumes. Issues are immutable snapshots;
//! changes only happen through `IssueTracker::update_issue`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::IntegrationResult;
use crate::core::{IdError, IssueIdentifier};

/// An issue snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Tracker-internal ID
    pub id: String,
    /// Human readable identifier (e.g., "AUTH-142")
    pub identifier: IssueIdentifier,
    /// Issue title
    pub title: String,
    /// Issue description (markdown)
    #[serde(default)]
    pub description: Option<String>,
    /// Lifecycle state
    pub state: IssueState,
    /// Priority (0 = none, 1 = urgent .. 4 = low)
    #[serde(default)]
    pub priority: Priority,
    /// Assignee display name
    #[serde(default)]
    pub assignee: Option<String>,
    /// Source-control branch name suggested by the tracker
    #[serde(default)]
    pub branch_name: Option<String>,
    /// URL to the issue
    pub url: String,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// An issue's lifecycle (workflow) state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueState {
    /// State ID
    pub id: String,
    /// State name (e.g., "In Progress")
    pub name: String,
    /// State type
    #[serde(rename = "type")]
    pub state_type: IssueStateType,
}

/// Category of a lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueStateType {
    Triage,
    Backlog,
    Unstarted,
    Started,
    Completed,
    Canceled,
    #[serde(other)]
    Other,
}

impl IssueStateType {
    /// Completed or canceled issues need no further work.
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Completed | Self::Canceled)
    }
}

/// Issue priority, 0..=4.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const NONE: Self = Self(0);
    pub const URGENT: Self = Self(1);
    pub const HIGH: Self = Self(2);
    pub const MEDIUM: Self = Self(3);
    pub const LOW: Self = Self(4);

    pub fn new(value: u8) -> Result<Self, IdError> {
        if value > 4 {
            return Err(IdError::Invalid { kind: "priority", value: value.to_string() });
        }
        Ok(Self(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Rank used for backlog ordering: "no priority" sorts after low.
    pub fn sort_rank(self) -> u8 {
        if self.0 == 0 {
            5
        } else {
            self.0
        }
    }
}

impl TryFrom<u8> for Priority {
    type Error = IdError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

/// Options for listing issues.
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    /// Filter by team ID
    pub team_id: Option<String>,
    /// Filter by assignee ID (use "me" for current user)
    pub assignee_id: Option<String>,
    /// Filter by state type
    pub state_types: Vec<IssueStateType>,
    /// Include completed/canceled issues
    pub include_archived: bool,
    /// Maximum number of results
    pub limit: Option<u32>,
}

/// Partial update forwarded to the tracker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssuePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub state_id: Option<String>,
    pub priority: Option<Priority>,
    pub assignee_id: Option<String>,
}

impl IssuePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Issue tracker client contract.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// List issues matching a filter.
    async fn get_issues(&self, filter: &IssueFilter) -> IntegrationResult<Vec<Issue>>;

    /// Fetch one issue by identifier.
    async fn get_issue(&self, identifier: &IssueIdentifier) -> IntegrationResult<Issue>;

    /// List the lifecycle states available to a team.
    async fn get_states(&self, team_id: &str) -> IntegrationResult<Vec<IssueState>>;

    /// Apply a partial update and return the updated snapshot.
    async fn update_issue(
        &self,
        identifier: &IssueIdentifier,
        patch: IssuePatch,
    ) -> IntegrationResult<Issue>;

    /// Add a markdown comment.
    async fn add_comment(&self, identifier: &IssueIdentifier, body: &str) -> IntegrationResult<()>;
}

/// Format an issue as a single dashboard line.
pub fn format_issue(issue: &Issue) -> String {
    let state_icon = match issue.state.state_type {
        IssueStateType::Triage => "?",
        IssueStateType::Backlog => "○",
        IssueStateType::Unstarted => "◌",
        IssueStateType::Started => "◐",
        IssueStateType::Completed => "●",
        IssueStateType::Canceled => "⊘",
        IssueStateType::Other => "·",
    };

    let priority_icon = match issue.priority.get() {
        1 => "!!",
        2 => "!",
        3 => "-",
        4 => ".",
        _ => " ",
    };

    let assignee = issue.assignee.as_ref().map(|a| format!(" → {}", a)).unwrap_or_default();

    format!("{} {} {} {}{}", state_icon, priority_icon, issue.identifier, issue.title, assignee)
}
