//! Wave-by-wave workflow execution.
//!
//! Waves run strictly in order. Every step of a wave is launched through
//! the session bridge and the wave is awaited as a whole, so a failing
//! step still lets its siblings finish before later waves are cancelled.
//!
//! Abort is cooperative. It stops further launches and moves the handle to
//! `aborted` at once, but sessions already spawned are not killed and still
//! report their results. Nothing here enforces timeouts: a step that never
//! returns holds its wave until the caller aborts and stops waiting.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

use super::bridge::{SessionBridge, SpawnError, SpawnRequest};
use super::definition::WorkflowDefinition;
use super::discovery::WorkflowRegistry;
use super::template::{interpolate, WorkflowContext};
use super::validate::{validate_workflow, ValidatedWorkflow, ValidationError};
use crate::core::{HandleId, StepId, WorkflowId};

const EVENT_CAPACITY: usize = 256;

/// Overall run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Failed,
    Aborted,
}

impl WorkflowStatus {
    pub fn is_terminal(self) -> bool {
        self != Self::Running
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Per-step status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Never launched because the run failed or was aborted
    Skipped,
}

/// Progress event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    StepStarted { handle: HandleId, step: StepId },
    StepCompleted { handle: HandleId, step: StepId },
    StepFailed { handle: HandleId, step: StepId, error: String },
    WorkflowCompleted { handle: HandleId },
    WorkflowFailed { handle: HandleId, step: StepId, error: String },
    WorkflowAborted { handle: HandleId },
}

impl WorkflowEvent {
    pub fn handle(&self) -> HandleId {
        match self {
            Self::StepStarted { handle, .. }
            | Self::StepCompleted { handle, .. }
            | Self::StepFailed { handle, .. }
            | Self::WorkflowCompleted { handle }
            | Self::WorkflowFailed { handle, .. }
            | Self::WorkflowAborted { handle } => *handle,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StepStarted { .. } => "step_started",
            Self::StepCompleted { .. } => "step_completed",
            Self::StepFailed { .. } => "step_failed",
            Self::WorkflowCompleted { .. } => "workflow_completed",
            Self::WorkflowFailed { .. } => "workflow_failed",
            Self::WorkflowAborted { .. } => "workflow_aborted",
        }
    }
}

/// The step that failed a run, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    pub step: StepId,
    pub message: String,
}

/// Scheduler errors.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("unknown workflow: {0}")]
    UnknownWorkflow(String),
}

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

struct HandleState {
    status: WorkflowStatus,
    steps: Vec<StepStatus>,
    failure: Option<StepFailure>,
    history: Vec<WorkflowEvent>,
}

struct HandleInner {
    id: HandleId,
    workflow: Arc<ValidatedWorkflow>,
    state: Mutex<HandleState>,
    events: broadcast::Sender<WorkflowEvent>,
    scheduler_events: Option<broadcast::Sender<WorkflowEvent>>,
    settled: watch::Sender<bool>,
}

impl HandleInner {
    fn emit(&self, state: &mut HandleState, event: WorkflowEvent) {
        tracing::debug!(handle = %self.id, event = event.name(), "Workflow event");
        state.history.push(event.clone());
        // Sending only fails when nobody is listening
        let _ = self.events.send(event.clone());
        if let Some(scheduler_events) = &self.scheduler_events {
            let _ = scheduler_events.send(event);
        }
    }

    fn step_id(&self, index: usize) -> StepId {
        self.workflow.steps()[index].id.clone()
    }

    /// Mark a step running unless the run already ended.
    fn try_launch(&self, index: usize) -> bool {
        let mut state = self.state.lock();
        if state.status != WorkflowStatus::Running {
            return false;
        }
        state.steps[index] = StepStatus::Running;
        let step = self.step_id(index);
        self.emit(&mut state, WorkflowEvent::StepStarted { handle: self.id, step });
        true
    }

    fn record_result(&self, index: usize, result: &Result<(), SpawnError>) {
        let mut state = self.state.lock();
        let step = self.step_id(index);
        match result {
            Ok(()) => {
                state.steps[index] = StepStatus::Completed;
                self.emit(&mut state, WorkflowEvent::StepCompleted { handle: self.id, step });
            }
            Err(e) => {
                tracing::warn!(handle = %self.id, step = %step, error = %e, "Workflow step failed");
                state.steps[index] = StepStatus::Failed;
                let event =
                    WorkflowEvent::StepFailed { handle: self.id, step, error: e.to_string() };
                self.emit(&mut state, event);
            }
        }
    }

    fn skip_pending(state: &mut HandleState) {
        for status in &mut state.steps {
            if *status == StepStatus::Pending {
                *status = StepStatus::Skipped;
            }
        }
    }

    fn abort(&self) -> bool {
        let mut state = self.state.lock();
        if state.status != WorkflowStatus::Running {
            return false;
        }
        state.status = WorkflowStatus::Aborted;
        Self::skip_pending(&mut state);
        self.emit(&mut state, WorkflowEvent::WorkflowAborted { handle: self.id });
        tracing::info!(handle = %self.id, workflow = %self.workflow.id(), "Workflow aborted");
        true
    }

    fn finish(&self, failure: Option<StepFailure>) {
        let mut state = self.state.lock();
        Self::skip_pending(&mut state);
        if state.status == WorkflowStatus::Running {
            match failure {
                Some(failure) => {
                    state.status = WorkflowStatus::Failed;
                    let event = WorkflowEvent::WorkflowFailed {
                        handle: self.id,
                        step: failure.step.clone(),
                        error: failure.message.clone(),
                    };
                    state.failure = Some(failure);
                    self.emit(&mut state, event);
                }
                None => {
                    state.status = WorkflowStatus::Completed;
                    self.emit(&mut state, WorkflowEvent::WorkflowCompleted { handle: self.id });
                }
            }
        }
        let status = state.status;
        drop(state);
        tracing::info!(
            handle = %self.id,
            workflow = %self.workflow.id(),
            status = %status,
            "Workflow settled"
        );
        self.settled.send_replace(true);
    }
}

/// A live, observable workflow run.
#[derive(Clone)]
pub struct WorkflowHandle {
    inner: Arc<HandleInner>,
}

impl std::fmt::Debug for WorkflowHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowHandle")
            .field("id", &self.inner.id)
            .field("workflow", self.inner.workflow.id())
            .field("status", &self.status())
            .finish()
    }
}

impl WorkflowHandle {
    pub fn id(&self) -> HandleId {
        self.inner.id
    }

    pub fn workflow_id(&self) -> &WorkflowId {
        self.inner.workflow.id()
    }

    pub fn status(&self) -> WorkflowStatus {
        self.inner.state.lock().status
    }

    pub fn step_status(&self, step: &StepId) -> Option<StepStatus> {
        let index = self.inner.workflow.steps().iter().position(|s| s.id == *step)?;
        Some(self.inner.state.lock().steps[index])
    }

    /// Every step with its status, in definition order.
    pub fn step_statuses(&self) -> Vec<(StepId, StepStatus)> {
        let state = self.inner.state.lock();
        self.inner
            .workflow
            .steps()
            .iter()
            .zip(state.steps.iter())
            .map(|(step, status)| (step.id.clone(), *status))
            .collect()
    }

    /// The failure that ended the run, if it failed.
    pub fn failure(&self) -> Option<StepFailure> {
        self.inner.state.lock().failure.clone()
    }

    /// Events emitted so far.
    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.inner.state.lock().history.clone()
    }

    /// Receive events emitted from now on.
    ///
    /// A slow receiver lags and loses events; it never stalls the run.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.inner.events.subscribe()
    }

    /// Stop scheduling new steps. Returns whether this call ended the run;
    /// aborting a finished or already-aborted run does nothing.
    pub fn abort(&self) -> bool {
        self.inner.abort()
    }

    /// Wait until the run has settled (every launched step reported) and
    /// return the final status.
    pub async fn wait(&self) -> WorkflowStatus {
        let mut settled = self.inner.settled.subscribe();
        // The sender lives in `inner`, which we hold, so this cannot close
        let _ = settled.wait_for(|done| *done).await;
        self.status()
    }
}

async fn run(inner: Arc<HandleInner>, bridge: Arc<dyn SessionBridge>, context: WorkflowContext) {
    let workflow = Arc::clone(&inner.workflow);
    let mut failure = None;

    for wave in workflow.wave_indices() {
        let mut launched = Vec::with_capacity(wave.len());
        for &index in wave {
            if !inner.try_launch(index) {
                break;
            }
            let step = &workflow.steps()[index];
            let request = SpawnRequest {
                cwd: context.cwd.clone(),
                name: format!("{} / {}", workflow.name(), step.name),
                initial_prompt: interpolate(&step.prompt, &context),
                model: step.model.clone(),
            };
            let inner = Arc::clone(&inner);
            let bridge = Arc::clone(&bridge);
            launched.push(async move {
                let result = AssertUnwindSafe(bridge.spawn_session(request))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(SpawnError::Panicked(panic_message(&*panic))));
                inner.record_result(index, &result);
                (index, result)
            });
        }
        if launched.is_empty() {
            break;
        }

        // Launch order is definition order, so the first error is the
        // earliest failing step of the wave
        failure = join_all(launched).await.into_iter().find_map(|(index, result)| {
            result.err().map(|e| StepFailure { step: inner.step_id(index), message: e.to_string() })
        });
        if failure.is_some() || inner.state.lock().status.is_terminal() {
            break;
        }
    }

    inner.finish(failure);
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Starts validated workflows against a session bridge.
///
/// Every started handle stays registered, settled or not, so `handle(id)`
/// keeps answering after a run ends. Long-lived schedulers must call
/// `prune_finished` to release settled runs.
pub struct WorkflowScheduler {
    bridge: Arc<dyn SessionBridge>,
    events: broadcast::Sender<WorkflowEvent>,
    handles: Mutex<HashMap<HandleId, WorkflowHandle>>,
}

impl WorkflowScheduler {
    pub fn new(bridge: Arc<dyn SessionBridge>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { bridge, events, handles: Mutex::new(HashMap::new()) }
    }

    /// Events from every run started by this scheduler.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    /// Start a run. Must be called from within a tokio runtime.
    pub fn start(&self, workflow: ValidatedWorkflow, context: WorkflowContext) -> WorkflowHandle {
        let id = HandleId::generate();
        let step_count = workflow.steps().len();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (settled, _) = watch::channel(false);

        let inner = Arc::new(HandleInner {
            id,
            workflow: Arc::new(workflow),
            state: Mutex::new(HandleState {
                status: WorkflowStatus::Running,
                steps: vec![StepStatus::Pending; step_count],
                failure: None,
                history: Vec::new(),
            }),
            events,
            scheduler_events: Some(self.events.clone()),
            settled,
        });

        tracing::info!(
            handle = %id,
            workflow = %inner.workflow.id(),
            steps = step_count,
            waves = inner.workflow.wave_indices().len(),
            "Workflow started"
        );

        let handle = WorkflowHandle { inner: Arc::clone(&inner) };
        self.handles.lock().insert(id, handle.clone());
        tokio::spawn(run(inner, Arc::clone(&self.bridge), context));
        handle
    }

    /// Validate a raw definition, then start it.
    pub fn start_definition(
        &self,
        definition: &WorkflowDefinition,
        context: WorkflowContext,
    ) -> SchedulerResult<WorkflowHandle> {
        let workflow = validate_workflow(definition)?;
        Ok(self.start(workflow, context))
    }

    /// Look up a discovered workflow by id, validate it, then start it.
    pub fn start_discovered(
        &self,
        registry: &WorkflowRegistry,
        id: &str,
        context: WorkflowContext,
    ) -> SchedulerResult<WorkflowHandle> {
        let found =
            registry.find(id).ok_or_else(|| SchedulerError::UnknownWorkflow(id.to_string()))?;
        self.start_definition(&found.definition, context)
    }

    pub fn handle(&self, id: HandleId) -> Option<WorkflowHandle> {
        self.handles.lock().get(&id).cloned()
    }

    /// Every registered run, including settled ones not yet pruned.
    pub fn handles(&self) -> Vec<WorkflowHandle> {
        self.handles.lock().values().cloned().collect()
    }

    /// Abort a run by handle id. Unknown ids are a no-op.
    pub fn abort(&self, id: HandleId) -> bool {
        self.handle(id).is_some_and(|h| h.abort())
    }

    /// Forget settled runs; returns how many were dropped. Running handles
    /// are kept.
    pub fn prune_finished(&self) -> usize {
        let mut handles = self.handles.lock();
        let before = handles.len();
        handles.retain(|_, h| !h.status().is_terminal());
        before - handles.len()
    }
}
