//! Workflow validation.
//!
//! Every problem is collected into one report; nothing short-circuits.
//! A successful check yields a `ValidatedWorkflow`, the only type the
//! scheduler will run.

use std::collections::HashSet;

use serde::Serialize;

use super::definition::WorkflowDefinition;
use super::waves::{dependency_indices, layer};
use crate::core::{StepId, WorkflowId};

/// One problem found in a workflow definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    #[error("workflow id is empty")]
    MissingId,

    #[error("workflow name is empty")]
    MissingName,

    #[error("workflow has no steps")]
    NoSteps,

    #[error("step #{index} has an empty id")]
    EmptyStepId { index: usize },

    #[error("duplicate step id '{step}'")]
    DuplicateStepId { step: String },

    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("circular dependency among steps: {}", .steps.join(", "))]
    CircularDependency { steps: Vec<String> },
}

/// A workflow failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("workflow '{workflow_id}' is invalid: {}", list_issues(.issues))]
pub struct ValidationError {
    /// Raw id of the rejected workflow (may be empty)
    pub workflow_id: String,
    /// Every issue found
    pub issues: Vec<ValidationIssue>,
}

fn list_issues(issues: &[ValidationIssue]) -> String {
    issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl ValidationError {
    pub fn has_cycle(&self) -> bool {
        self.issues.iter().any(|i| matches!(i, ValidationIssue::CircularDependency { .. }))
    }
}

/// A step whose ids have passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedStep {
    pub id: StepId,
    pub name: String,
    pub prompt: String,
    pub model: Option<String>,
    pub depends_on: Vec<StepId>,
}

/// A workflow that passed validation, with its execution waves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedWorkflow {
    id: WorkflowId,
    name: String,
    steps: Vec<ValidatedStep>,
    waves: Vec<Vec<usize>>,
}

impl ValidatedWorkflow {
    pub fn id(&self) -> &WorkflowId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Steps in definition order.
    pub fn steps(&self) -> &[ValidatedStep] {
        &self.steps
    }

    /// Waves as indices into `steps()`.
    pub fn wave_indices(&self) -> &[Vec<usize>] {
        &self.waves
    }

    /// Waves as steps.
    pub fn waves(&self) -> impl Iterator<Item = Vec<&ValidatedStep>> + '_ {
        self.waves.iter().map(|wave| wave.iter().map(|&i| &self.steps[i]).collect())
    }
}

/// Check a definition and build its validated form.
pub fn validate_workflow(
    definition: &WorkflowDefinition,
) -> Result<ValidatedWorkflow, ValidationError> {
    let mut issues = Vec::new();

    let workflow_id = WorkflowId::new(definition.id.clone()).ok();
    if workflow_id.is_none() {
        issues.push(ValidationIssue::MissingId);
    }
    if definition.name.trim().is_empty() {
        issues.push(ValidationIssue::MissingName);
    }
    if definition.steps.is_empty() {
        issues.push(ValidationIssue::NoSteps);
    }

    let mut seen = HashSet::new();
    let mut step_ids = Vec::with_capacity(definition.steps.len());
    for (index, step) in definition.steps.iter().enumerate() {
        match StepId::new(step.id.clone()) {
            Ok(id) => {
                if !seen.insert(step.id.as_str()) {
                    issues.push(ValidationIssue::DuplicateStepId { step: step.id.clone() });
                }
                step_ids.push(Some(id));
            }
            Err(_) => {
                issues.push(ValidationIssue::EmptyStepId { index });
                step_ids.push(None);
            }
        }
    }

    let known: HashSet<&str> = definition.steps.iter().map(|s| s.id.as_str()).collect();
    for step in &definition.steps {
        for dependency in &step.depends_on {
            if !known.contains(dependency.as_str()) {
                issues.push(ValidationIssue::UnknownDependency {
                    step: step.id.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }

    let layering = layer(&dependency_indices(&definition.steps));
    if !layering.is_acyclic() {
        let steps = layering.stuck.iter().map(|&i| definition.steps[i].id.clone()).collect();
        issues.push(ValidationIssue::CircularDependency { steps });
    }

    let invalid = |issues| ValidationError { workflow_id: definition.id.clone(), issues };
    if !issues.is_empty() {
        tracing::debug!(
            workflow = %definition.id,
            issues = issues.len(),
            "Workflow failed validation"
        );
        return Err(invalid(issues));
    }

    let step_ids: Option<Vec<StepId>> = step_ids.into_iter().collect();
    let (Some(id), Some(step_ids)) = (workflow_id, step_ids) else {
        return Err(invalid(vec![ValidationIssue::MissingId]));
    };

    let steps = definition
        .steps
        .iter()
        .zip(step_ids)
        .map(|(step, id)| ValidatedStep {
            id,
            name: step.name.clone(),
            prompt: step.prompt.clone(),
            model: step.model.clone(),
            depends_on: step
                .depends_on
                .iter()
                .filter_map(|d| StepId::new(d.clone()).ok())
                .collect(),
        })
        .collect();

    Ok(ValidatedWorkflow { id, name: definition.name.clone(), steps, waves: layering.waves })
}
