//! Code host contract.
//!
//! Pull request snapshots and the client trait used to list and act on
//! them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::IntegrationResult;
use crate::core::{IssueIdentifier, PrNumber};

/// A pull request snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    /// PR number
    pub number: PrNumber,
    /// PR title
    pub title: String,
    /// Author login
    pub author: String,
    /// Lifecycle state
    pub state: PrState,
    /// Combined CI status of the head commit
    #[serde(default)]
    pub ci_status: CiStatus,
    /// Review decision, when the host reports one
    #[serde(default)]
    pub review_decision: Option<ReviewDecision>,
    /// Source branch
    pub head_ref: String,
    /// HTML URL to the PR
    pub url: String,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Ticket identifier extracted by the client (title or branch)
    #[serde(default)]
    pub ticket_id: Option<IssueIdentifier>,
}

/// Pull request lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrState {
    Open,
    Draft,
    Closed,
    Merged,
}

impl PrState {
    /// Open or draft: the PR still represents in-flight work.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Open | Self::Draft)
    }
}

/// Combined CI status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CiStatus {
    #[default]
    None,
    Pending,
    Pass,
    Fail,
}

/// Review decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    ChangesRequested,
    ReviewRequired,
}

/// Options for creating a pull request.
#[derive(Debug, Clone, Default)]
pub struct CreatePrOptions {
    /// PR title (required)
    pub title: String,
    /// PR body
    pub body: Option<String>,
    /// Source branch (required)
    pub head: String,
    /// Target branch (required)
    pub base: String,
    /// Open as draft
    pub draft: bool,
}

impl PullRequest {
    /// Fill `ticket_id` from the head branch when the client did not.
    pub fn with_extracted_ticket(mut self) -> Self {
        if self.ticket_id.is_none() {
            self.ticket_id = crate::enrich::extract_identifier(&self.head_ref);
        }
        self
    }
}

/// Code host client contract.
#[async_trait]
pub trait CodeHost: Send + Sync {
    /// List pull requests for the configured repository.
    async fn list_prs(&self) -> IntegrationResult<Vec<PullRequest>>;

    /// Fetch one pull request.
    async fn get_pr(&self, number: PrNumber) -> IntegrationResult<PullRequest>;

    /// Open a new pull request.
    async fn create_pr(&self, options: CreatePrOptions) -> IntegrationResult<PullRequest>;

    /// Add a comment to a pull request.
    async fn comment(&self, number: PrNumber, body: &str) -> IntegrationResult<()>;

    /// Submit an approving review.
    async fn approve_pr(&self, number: PrNumber) -> IntegrationResult<()>;
}
