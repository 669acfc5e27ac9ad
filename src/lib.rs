//! # Workdeck
//!
//! Orchestration core for an operator dashboard over coding-agent work sessions.
//!
//! Workdeck correlates running agent sessions with issues, pull requests, specs and
//! worktrees, and drives multi-step agent workflows as parallel dependency waves.
//!
//! ## Components
//!
//! - **Enrichment** (`enrich`): joins raw artifact collections into a ranked dashboard model
//! - **Workflows** (`workflow`): discovery, validation, wave layering and execution
//! - **Sessions** (`session`): worker and spec state machines plus operator notices
//! - **State** (`state`): transactional JSON persistence with WAL recovery
//!
//! ## Quick Start
//!
//! ```bash
//! # Validate and plan a workflow
//! workdeck workflows plan ship-feature
//!
//! # Render a dashboard from a snapshot of raw collections
//! workdeck dashboard snapshot.json
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::too_many_lines)]

pub mod core;
pub mod enrich;
pub mod integrations;
pub mod session;
pub mod state;
pub mod workflow;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use crate::core::{Config, IssueIdentifier, SessionId, StepId, WorkflowId};
pub use enrich::{enrich, Badge, EnrichedIssue, EnrichmentInputs, EnrichmentResult, Section};
pub use integrations::{Issue, PullRequest, Spec, Worktree};
pub use session::{
    NotificationAggregator, SessionRegistry, SessionStatus, SpecStatus, TransitionError,
    WorkerSession,
};
pub use state::{Operation, StateError, StateManager, StateOptions};
pub use workflow::{
    validate_workflow, WorkflowDefinition, WorkflowHandle, WorkflowRegistry, WorkflowScheduler,
    WorkflowStatus,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "workdeck";
