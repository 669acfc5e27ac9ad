//! Artifact-to-issue matching.
//!
//! Each linker returns, per input artifact, the index of the issue it
//! attaches to (or `None`). Selection among several candidates for one
//! issue happens in the caller.

use std::collections::HashMap;
use std::path::Path;

use super::identifier::extract_identifier;
use crate::core::IssueIdentifier;
use crate::integrations::{Issue, PullRequest, Spec, Worktree};
use crate::session::WorkerSession;

/// Lookup tables over one issue snapshot.
#[derive(Debug, Default)]
pub struct IssueIndex<'a> {
    by_branch: HashMap<&'a str, usize>,
    by_identifier: HashMap<&'a IssueIdentifier, usize>,
    by_id: HashMap<&'a str, usize>,
}

impl<'a> IssueIndex<'a> {
    /// Index issues; on duplicate keys the first issue wins.
    pub fn build(issues: &'a [Issue]) -> Self {
        let mut index = Self::default();
        for (i, issue) in issues.iter().enumerate() {
            if let Some(branch) = issue.branch_name.as_deref().filter(|b| !b.is_empty()) {
                index.by_branch.entry(branch).or_insert(i);
            }
            index.by_identifier.entry(&issue.identifier).or_insert(i);
            index.by_id.entry(issue.id.as_str()).or_insert(i);
        }
        index
    }

    pub fn by_identifier(&self, identifier: &IssueIdentifier) -> Option<usize> {
        self.by_identifier.get(identifier).copied()
    }

    /// Exact branch match, then an identifier extracted from the branch.
    pub fn by_branch(&self, branch: &str) -> Option<usize> {
        self.by_branch
            .get(branch)
            .copied()
            .or_else(|| extract_identifier(branch).and_then(|id| self.by_identifier(&id)))
    }

    /// Resolve an operator-supplied reference: identifier (any case) or
    /// tracker-internal id.
    pub fn lookup(&self, reference: &str) -> Option<usize> {
        IssueIdentifier::parse(reference)
            .ok()
            .and_then(|id| self.by_identifier(&id))
            .or_else(|| self.by_id.get(reference.trim()).copied())
    }
}

/// The most specific worktree containing `cwd`.
pub fn worktree_for<'w>(worktrees: &'w [Worktree], cwd: &Path) -> Option<&'w Worktree> {
    worktrees
        .iter()
        .filter(|wt| wt.contains(cwd))
        .fold(None, |best: Option<&Worktree>, wt| match best {
            Some(b) if b.path.components().count() >= wt.path.components().count() => Some(b),
            _ => Some(wt),
        })
}

/// Link sessions through the worktree that holds their working directory.
pub fn link_sessions(
    index: &IssueIndex<'_>,
    sessions: &[WorkerSession],
    worktrees: &[Worktree],
) -> Vec<Option<usize>> {
    sessions
        .iter()
        .map(|session| {
            worktree_for(worktrees, &session.cwd)
                .and_then(|wt| wt.branch.as_deref())
                .and_then(|branch| index.by_branch(branch))
        })
        .collect()
}

/// Link pull requests by head ref, pre-extracted ticket, then an
/// identifier extracted from the head ref.
pub fn link_prs(index: &IssueIndex<'_>, prs: &[PullRequest]) -> Vec<Option<usize>> {
    prs.iter()
        .map(|pr| {
            index
                .by_branch
                .get(pr.head_ref.as_str())
                .copied()
                .or_else(|| pr.ticket_id.as_ref().and_then(|id| index.by_identifier(id)))
                .or_else(|| {
                    extract_identifier(&pr.head_ref).and_then(|id| index.by_identifier(&id))
                })
        })
        .collect()
}

/// Link specs by issue identifier.
pub fn link_specs(index: &IssueIndex<'_>, specs: &[Spec]) -> Vec<Option<usize>> {
    specs
        .iter()
        .map(|spec| spec.issue_id.as_ref().and_then(|id| index.by_identifier(id)))
        .collect()
}

/// Link worktrees by branch.
pub fn link_worktrees(index: &IssueIndex<'_>, worktrees: &[Worktree]) -> Vec<Option<usize>> {
    worktrees
        .iter()
        .map(|wt| wt.branch.as_deref().and_then(|branch| index.by_branch(branch)))
        .collect()
}
