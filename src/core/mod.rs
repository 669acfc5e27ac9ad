//! Core types shared by every Workdeck module.
//!
//! Validated identifiers and the application configuration.

mod config;
mod ids;

pub use config::{Config, DashboardConfig, NotificationsConfig, StateConfig, WorkflowsConfig};
pub use ids::{
    HandleId, IdError, IdResult, IssueIdentifier, PrNumber, SessionId, SpecId, StepId, WorkflowId,
};
