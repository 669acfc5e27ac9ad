//! Workflow scheduler.
//!
//! Step graphs are discovered from ordered sources, validated, layered into
//! dependency waves and executed through a session bridge.
//!
//! ## Pipeline
//!
//! - `WorkflowRegistry` - first-id-wins discovery over `WorkflowSource`s
//! - `validate_workflow` - collects every graph problem into one error
//! - `layer` / `compute_waves` - Kahn layering into concurrent waves
//! - `WorkflowScheduler` - runs waves and exposes live `WorkflowHandle`s
//!
//! Abort is cooperative: it stops new steps from launching but never kills
//! a step that is already running.

mod bridge;
mod definition;
mod discovery;
mod scheduler;
mod template;
mod validate;
mod waves;

pub use bridge::{DryRunBridge, SessionBridge, SpawnError, SpawnRequest};
pub use definition::{WorkflowDefinition, WorkflowStep};
pub use discovery::{
    parse_definition_file, DirectorySource, DiscoveredWorkflow, StaticSource, WorkflowRegistry,
    WorkflowSource,
};
pub use scheduler::{
    SchedulerError, SchedulerResult, StepFailure, StepStatus, WorkflowEvent, WorkflowHandle,
    WorkflowScheduler, WorkflowStatus,
};
pub use template::{interpolate, placeholders, unresolved, WorkflowContext, ISSUE_ID_KEY};
pub use validate::{
    validate_workflow, ValidatedStep, ValidatedWorkflow, ValidationError, ValidationIssue,
};
pub use waves::{compute_waves, dependency_indices, layer, Layering};
