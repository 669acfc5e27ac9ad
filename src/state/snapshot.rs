//! Point-in-time copies of the managed value.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(Uuid);

impl SnapshotId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value.trim()).ok().map(Self)
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A copy of the managed value at one moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot<T> {
    /// Snapshot ID
    pub id: SnapshotId,
    /// Why it was taken
    pub label: String,
    /// When it was taken
    pub created_at: DateTime<Utc>,
    /// The value itself
    pub value: T,
}

impl<T> StateSnapshot<T> {
    pub fn new(label: impl Into<String>, value: T) -> Self {
        Self { id: SnapshotId::generate(), label: label.into(), created_at: Utc::now(), value }
    }
}

/// Bounded snapshot history; the oldest entry is evicted first.
#[derive(Debug, Clone)]
pub struct SnapshotHistory<T> {
    snapshots: VecDeque<StateSnapshot<T>>,
    max: usize,
}

impl<T> SnapshotHistory<T> {
    /// A history holding at most `max` snapshots (at least one).
    pub fn new(max: usize) -> Self {
        Self { snapshots: VecDeque::new(), max: max.max(1) }
    }

    /// Record a snapshot, returning the one evicted to make room.
    pub fn push(&mut self, snapshot: StateSnapshot<T>) -> Option<StateSnapshot<T>> {
        let evicted =
            if self.snapshots.len() >= self.max { self.snapshots.pop_front() } else { None };
        self.snapshots.push_back(snapshot);
        evicted
    }

    pub fn get(&self, id: SnapshotId) -> Option<&StateSnapshot<T>> {
        self.snapshots.iter().find(|s| s.id == id)
    }

    pub fn latest(&self) -> Option<&StateSnapshot<T>> {
        self.snapshots.back()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &StateSnapshot<T>> {
        self.snapshots.iter()
    }

    pub fn capacity(&self) -> usize {
        self.max
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_bounded() {
        let mut history = SnapshotHistory::new(2);
        let first = StateSnapshot::new("one", 1);
        let first_id = first.id;
        assert!(history.push(first).is_none());
        history.push(StateSnapshot::new("two", 2));
        let evicted = history.push(StateSnapshot::new("three", 3)).unwrap();

        assert_eq!(evicted.id, first_id);
        assert_eq!(history.len(), 2);
        assert!(history.get(first_id).is_none());
        assert_eq!(history.latest().unwrap().value, 3);
        let labels: Vec<_> = history.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["two", "three"]);
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let mut history = SnapshotHistory::new(0);
        history.push(StateSnapshot::new("a", ()));
        history.push(StateSnapshot::new("b", ()));
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_snapshot_id_parse() {
        let id = SnapshotId::generate();
        assert_eq!(SnapshotId::parse(&id.to_string()), Some(id));
        assert_eq!(SnapshotId::parse("nope"), None);
    }
}
