//! External integration contracts.
//!
//! Typed snapshots and client traits for the issue tracker, code host and
//! spec store, plus worktree snapshots. Concrete clients live outside this
//! crate; the core only consumes these contracts.

mod code_host;
mod error;
mod issue_tracker;
mod spec_store;
mod worktree;

pub use code_host::{CiStatus, CodeHost, CreatePrOptions, PrState, PullRequest, ReviewDecision};
pub use error::{IntegrationError, IntegrationResult};
pub use issue_tracker::{
    format_issue, Issue, IssueFilter, IssuePatch, IssueState, IssueStateType, IssueTracker,
    Priority,
};
pub use spec_store::{transition_spec, Spec, SpecStore, SpecUpdateError};
pub use worktree::Worktree;
