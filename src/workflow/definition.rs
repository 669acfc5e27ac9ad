//! Workflow definition schema.
//!
//! Definitions are plain structured data. Ids are kept as raw strings here
//! so validation can report empty or dangling references instead of
//! failing at deserialization.

use serde::{Deserialize, Serialize};

/// A workflow definition as supplied by a source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    /// Unique workflow id
    #[serde(default)]
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// What this workflow does
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Steps, in definition order
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
}

/// One step of a workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    /// Step id, unique within the workflow
    #[serde(default)]
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Prompt template handed to the spawned session
    #[serde(default)]
    pub prompt: String,

    /// Model hint for the session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Ids of steps that must complete first
    #[serde(default, alias = "depends_on")]
    pub depends_on: Vec<String>,
}

impl WorkflowDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), description: None, steps: Vec::new() }
    }

    /// Append a step.
    #[must_use]
    pub fn step(mut self, step: WorkflowStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn find_step(&self, id: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.id == id)
    }
}

impl WorkflowStep {
    pub fn new(id: impl Into<String>, name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            prompt: prompt.into(),
            model: None,
            depends_on: Vec::new(),
        }
    }

    #[must_use]
    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(deps.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_camel_case_json() {
        let json = r#"{
            "id": "ship",
            "name": "Ship it",
            "steps": [
                { "id": "plan", "name": "Plan", "prompt": "Plan {{issueId}}" },
                { "id": "build", "name": "Build", "prompt": "Build", "dependsOn": ["plan"], "model": "fast" }
            ]
        }"#;

        let def: WorkflowDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.steps.len(), 2);
        assert_eq!(def.find_step("build").unwrap().depends_on, vec!["plan"]);
        assert_eq!(def.find_step("build").unwrap().model.as_deref(), Some("fast"));
        assert!(def.description.is_none());
    }

    #[test]
    fn test_parse_yaml_with_snake_case_alias() {
        let yaml = r#"
id: review
name: Review
steps:
  - id: a
    name: A
    prompt: do a
  - id: b
    name: B
    prompt: do b
    depends_on: [a]
"#;
        let def: WorkflowDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.steps[1].depends_on, vec!["a"]);
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let def: WorkflowDefinition = serde_json::from_str("{}").unwrap();
        assert!(def.id.is_empty());
        assert!(def.steps.is_empty());
    }

    #[test]
    fn test_builder() {
        let def = WorkflowDefinition::new("w", "W")
            .step(WorkflowStep::new("a", "A", "x"))
            .step(WorkflowStep::new("b", "B", "y").depends_on(["a"]).model("m"));
        assert_eq!(def.steps[1].depends_on, vec!["a".to_string()]);
    }
}
