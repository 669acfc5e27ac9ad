//! Prompt template interpolation.

use std::collections::HashMap;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::core::IssueIdentifier;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*(\w+)\s*\}\}").expect("static regex"));

/// Placeholder name bound to the context's issue id.
pub const ISSUE_ID_KEY: &str = "issueId";

/// Values available to step prompts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowContext {
    /// Working directory for spawned sessions
    pub cwd: PathBuf,
    /// Issue the run is for
    #[serde(default)]
    pub issue_id: Option<IssueIdentifier>,
    /// Free-form variables
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

impl WorkflowContext {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into(), ..Default::default() }
    }

    #[must_use]
    pub fn with_issue(mut self, issue_id: IssueIdentifier) -> Self {
        self.issue_id = Some(issue_id);
        self
    }

    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Value for a placeholder name. The issue id shadows a variable of the
    /// same name.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        if name == ISSUE_ID_KEY {
            if let Some(issue) = &self.issue_id {
                return Some(issue.as_str());
            }
        }
        self.variables.get(name).map(String::as_str)
    }
}

/// Replace `{{name}}` placeholders with context values.
///
/// Unknown placeholders are left exactly as written.
pub fn interpolate(template: &str, context: &WorkflowContext) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| match context.lookup(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Placeholder names a template references, in order of first use.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Placeholder names the context cannot resolve.
pub fn unresolved(template: &str, context: &WorkflowContext) -> Vec<String> {
    placeholders(template).into_iter().filter(|name| context.lookup(name).is_none()).collect()
}
