//! Workflow discovery.
//!
//! Definitions come from an ordered list of sources. The first definition
//! seen for an id wins; later sources cannot override it. A broken file
//! or source is skipped, never fatal.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use walkdir::WalkDir;

use super::definition::WorkflowDefinition;

/// Something that can list workflow definitions.
pub trait WorkflowSource: Send + Sync {
    /// Label used in logs and listings.
    fn name(&self) -> String;

    /// All definitions this source currently provides.
    fn list(&self) -> Vec<WorkflowDefinition>;
}

/// A file may hold one definition or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum DefinitionFile {
    One(WorkflowDefinition),
    Many(Vec<WorkflowDefinition>),
}

impl DefinitionFile {
    fn into_vec(self) -> Vec<WorkflowDefinition> {
        match self {
            Self::One(def) => vec![def],
            Self::Many(defs) => defs,
        }
    }
}

/// Parse a definition file by extension.
pub fn parse_definition_file(path: &Path) -> anyhow::Result<Vec<WorkflowDefinition>> {
    let content = std::fs::read_to_string(path)?;
    let parsed: DefinitionFile = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)?,
        Some("yaml" | "yml") => serde_yaml::from_str(&content)?,
        _ => anyhow::bail!("unsupported workflow file: {}", path.display()),
    };
    Ok(parsed.into_vec())
}

fn is_definition_file(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "json" || e == "yaml" || e == "yml")
}

/// Definitions stored as `*.json` / `*.yaml` / `*.yml` files in one
/// directory (not recursive).
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl WorkflowSource for DirectorySource {
    fn name(&self) -> String {
        self.dir.display().to_string()
    }

    fn list(&self) -> Vec<WorkflowDefinition> {
        if !self.dir.is_dir() {
            tracing::debug!(dir = ?self.dir, "Workflow directory does not exist");
            return Vec::new();
        }

        let mut definitions = Vec::new();
        let entries = WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(dir = ?self.dir, error = %e, "Failed to read workflow entry");
                    None
                }
            });

        for entry in entries {
            let path = entry.path();
            if !entry.file_type().is_file() || !is_definition_file(path) {
                continue;
            }
            match parse_definition_file(path) {
                Ok(parsed) => {
                    for def in parsed {
                        if def.id.trim().is_empty() {
                            tracing::warn!(path = ?path, "Skipping workflow without an id");
                            continue;
                        }
                        definitions.push(def);
                    }
                }
                Err(e) => {
                    tracing::warn!(path = ?path, error = %e, "Failed to parse workflow file");
                }
            }
        }

        definitions
    }
}

/// In-memory definitions.
#[derive(Debug, Clone)]
pub struct StaticSource {
    name: String,
    definitions: Vec<WorkflowDefinition>,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, definitions: Vec<WorkflowDefinition>) -> Self {
        Self { name: name.into(), definitions }
    }
}

impl WorkflowSource for StaticSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn list(&self) -> Vec<WorkflowDefinition> {
        self.definitions.clone()
    }
}

/// A definition together with the source it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredWorkflow {
    pub definition: WorkflowDefinition,
    pub source: String,
}

/// Ordered set of workflow sources.
#[derive(Default)]
pub struct WorkflowRegistry {
    sources: Vec<Box<dyn WorkflowSource>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One `DirectorySource` per directory, in priority order.
    pub fn from_dirs<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut registry = Self::new();
        for dir in dirs {
            registry.register_source(DirectorySource::new(dir));
        }
        registry
    }

    /// Append a source with lower priority than all existing ones.
    pub fn register_source(&mut self, source: impl WorkflowSource + 'static) {
        self.sources.push(Box::new(source));
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Every distinct workflow, first id wins.
    pub fn discover(&self) -> Vec<DiscoveredWorkflow> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for source in &self.sources {
            let source_name = source.name();
            for definition in source.list() {
                if definition.id.trim().is_empty() {
                    continue;
                }
                if !seen.insert(definition.id.clone()) {
                    tracing::debug!(
                        workflow = %definition.id,
                        source = %source_name,
                        "Workflow shadowed by an earlier source"
                    );
                    continue;
                }
                found.push(DiscoveredWorkflow { definition, source: source_name.clone() });
            }
        }
        found
    }

    /// The winning definition for `id`.
    pub fn find(&self, id: &str) -> Option<DiscoveredWorkflow> {
        self.discover().into_iter().find(|w| w.definition.id == id)
    }
}
