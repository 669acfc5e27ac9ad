//! Document operations addressed by dot-separated key paths.
//!
//! A path like `sessions.abc.status` walks object keys; numeric segments
//! index arrays. The empty path addresses the root. Every operation is
//! idempotent: applying the same operation twice leaves the same document
//! as applying it once, which is what makes WAL replay safe.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::{StateError, StateResult};

/// One mutation inside a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Write `value` at `path`, creating intermediate objects.
    Set { path: String, value: Value },
    /// Shallow-merge the fields of `value` into the existing object at `path`.
    Update { path: String, value: Value },
    /// Deep-merge `value` into whatever is at `path`.
    Merge { path: String, value: Value },
    /// Replace the existing value at `path`.
    Replace { path: String, value: Value },
    /// Remove the object key at `path`; a missing key is a no-op.
    Delete { path: String },
}

impl Operation {
    pub fn set(path: impl Into<String>, value: Value) -> Self {
        Self::Set { path: path.into(), value }
    }

    pub fn update(path: impl Into<String>, value: Value) -> Self {
        Self::Update { path: path.into(), value }
    }

    pub fn merge(path: impl Into<String>, value: Value) -> Self {
        Self::Merge { path: path.into(), value }
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self::Replace { path: path.into(), value }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::Delete { path: path.into() }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Set { .. } => "set",
            Self::Update { .. } => "update",
            Self::Merge { .. } => "merge",
            Self::Replace { .. } => "replace",
            Self::Delete { .. } => "delete",
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Set { path, .. }
            | Self::Update { path, .. }
            | Self::Merge { path, .. }
            | Self::Replace { path, .. }
            | Self::Delete { path } => path,
        }
    }
}

/// Split a key path into segments. The empty path is the root.
pub fn parse_path(path: &str) -> StateResult<Vec<&str>> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(StateError::invalid_path(path, "empty segment"));
    }
    Ok(segments)
}

/// Read the value at `path`, if present.
pub fn get_path<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    let segments = parse_path(path).ok()?;
    segments.iter().try_fold(root, |node, segment| match node {
        Value::Object(map) => map.get(*segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn lookup_mut<'v>(root: &'v mut Value, segments: &[&str]) -> Option<&'v mut Value> {
    segments.iter().try_fold(root, |node, segment| match node {
        Value::Object(map) => map.get_mut(*segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
        _ => None,
    })
}

fn array_index(segment: &str, path: &str) -> StateResult<usize> {
    segment
        .parse::<usize>()
        .map_err(|_| StateError::invalid_path(path, format!("'{segment}' is not an array index")))
}

/// Walk to `segments`, turning null or missing intermediates into objects.
fn descend_create<'v>(
    root: &'v mut Value,
    segments: &[&str],
    path: &str,
) -> StateResult<&'v mut Value> {
    let mut node = root;
    for segment in segments {
        if node.is_null() {
            *node = Value::Object(Map::new());
        }
        node = match node {
            Value::Object(map) => map.entry((*segment).to_string()).or_insert(Value::Null),
            Value::Array(items) => {
                let index = array_index(segment, path)?;
                let len = items.len();
                match items.get_mut(index) {
                    Some(item) => item,
                    None => {
                        return Err(StateError::invalid_path(
                            path,
                            format!("index {index} is out of bounds for length {len}"),
                        ))
                    }
                }
            }
            _ => {
                return Err(StateError::invalid_path(
                    path,
                    format!("cannot descend into '{segment}' of a scalar"),
                ))
            }
        };
    }
    Ok(node)
}

fn existing_mut<'v>(
    root: &'v mut Value,
    segments: &[&str],
    path: &str,
) -> StateResult<&'v mut Value> {
    lookup_mut(root, segments).ok_or_else(|| StateError::invalid_path(path, "no value at path"))
}

/// Recursively merge `patch` into `target`. Objects merge key by key; any
/// other value replaces what was there.
pub fn deep_merge(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(existing), Value::Object(patch)) => {
            for (key, value) in patch {
                match existing.get_mut(&key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

fn set(root: &mut Value, segments: &[&str], value: Value, path: &str) -> StateResult<()> {
    let Some((last, parents)) = segments.split_last() else {
        *root = value;
        return Ok(());
    };

    let parent = descend_create(root, parents, path)?;
    if parent.is_null() {
        *parent = Value::Object(Map::new());
    }
    match parent {
        Value::Object(map) => {
            map.insert((*last).to_string(), value);
        }
        Value::Array(items) => {
            let index = array_index(last, path)?;
            if index < items.len() {
                items[index] = value;
            } else if index == items.len() {
                items.push(value);
            } else {
                return Err(StateError::invalid_path(
                    path,
                    format!("index {index} is out of bounds for length {}", items.len()),
                ));
            }
        }
        _ => return Err(StateError::invalid_path(path, "parent is a scalar")),
    }
    Ok(())
}

fn delete(root: &mut Value, segments: &[&str], path: &str) -> StateResult<()> {
    let Some((last, parents)) = segments.split_last() else {
        return Err(StateError::invalid_path(path, "cannot delete the root"));
    };
    match lookup_mut(root, parents) {
        Some(Value::Object(map)) => {
            map.remove(*last);
            Ok(())
        }
        // Removing by index would shift later elements on every replay
        Some(Value::Array(_)) => {
            Err(StateError::invalid_path(path, "array elements cannot be deleted by index"))
        }
        _ => Ok(()),
    }
}

/// Apply one operation in place.
pub fn apply(root: &mut Value, operation: &Operation) -> StateResult<()> {
    let path = operation.path();
    let segments = parse_path(path)?;

    match operation {
        Operation::Set { value, .. } => set(root, &segments, value.clone(), path),
        Operation::Update { value, .. } => {
            let Value::Object(fields) = value else {
                return Err(StateError::invalid_path(path, "update value must be an object"));
            };
            match existing_mut(root, &segments, path)? {
                Value::Object(target) => {
                    for (key, field) in fields {
                        target.insert(key.clone(), field.clone());
                    }
                    Ok(())
                }
                _ => Err(StateError::invalid_path(path, "update target is not an object")),
            }
        }
        Operation::Merge { value, .. } => {
            let target = descend_create(root, &segments, path)?;
            deep_merge(target, value.clone());
            Ok(())
        }
        Operation::Replace { value, .. } => {
            *existing_mut(root, &segments, path)? = value.clone();
            Ok(())
        }
        Operation::Delete { .. } => delete(root, &segments, path),
    }
}

/// Apply operations in order, stopping at the first failure.
pub fn apply_all(root: &mut Value, operations: &[Operation]) -> StateResult<()> {
    for operation in operations {
        apply(root, operation)?;
    }
    Ok(())
}
