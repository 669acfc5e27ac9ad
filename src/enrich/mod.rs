//! Enrichment and correlation engine.
//!
//! Joins independently fetched issues, sessions, pull requests, specs and
//! worktrees into one ranked dashboard model. The pass is a pure function:
//! it performs no I/O, never fails, and rebuilds everything from its inputs
//! so nothing stale carries over between refreshes. Missing or conflicting
//! data degrades to an unlinked item or an empty optional field.

mod badge;
mod identifier;
mod link;
mod section;
mod sources;

use serde::{Deserialize, Serialize};

pub use badge::{pr_badge, pr_badges, resolve_badge, session_badge, Badge};
pub use identifier::extract_identifier;
pub use link::{link_prs, link_sessions, link_specs, link_worktrees, worktree_for, IssueIndex};
pub use section::{assign_section, compare, last_activity, sort_issues, Section};
pub use sources::{gather_inputs, DashboardSources};

use crate::integrations::{Issue, PullRequest, Spec, Worktree};
use crate::session::WorkerSession;

/// An issue with everything linked to it and its derived placement.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedIssue {
    /// Source issue
    pub issue: Issue,
    /// Linked sessions, in input order
    pub sessions: Vec<WorkerSession>,
    /// Most recently updated linked pull request
    pub pr: Option<PullRequest>,
    /// Most recently updated linked spec
    pub spec: Option<Spec>,
    /// First linked worktree
    pub worktree: Option<Worktree>,
    /// Dashboard section
    pub section: Section,
    /// Most urgent badge
    pub badge: Badge,
}

/// A pull request or session that matched no issue.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnlinkedItem {
    PullRequest { pr: PullRequest, badge: Badge },
    Session { session: WorkerSession, badge: Badge },
}

impl UnlinkedItem {
    pub fn badge(&self) -> Badge {
        match self {
            Self::PullRequest { badge, .. } | Self::Session { badge, .. } => *badge,
        }
    }
}

/// Output of one enrichment pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EnrichmentResult {
    /// Issues in dashboard order
    pub issues: Vec<EnrichedIssue>,
    /// Sessions first, then pull requests, each in input order
    pub unlinked: Vec<UnlinkedItem>,
}

impl EnrichmentResult {
    /// Issues in one section, in dashboard order.
    pub fn section(&self, section: Section) -> impl Iterator<Item = &EnrichedIssue> {
        self.issues.iter().filter(move |i| i.section == section)
    }
}

/// Raw collections for one enrichment pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentInputs {
    pub issues: Vec<Issue>,
    pub sessions: Vec<WorkerSession>,
    pub prs: Vec<PullRequest>,
    pub specs: Vec<Spec>,
    pub worktrees: Vec<Worktree>,
}

impl EnrichmentInputs {
    pub fn enrich(&self) -> EnrichmentResult {
        enrich(&self.issues, &self.sessions, &self.prs, &self.specs, &self.worktrees)
    }
}

/// Build the dashboard model from raw artifact collections.
pub fn enrich(
    issues: &[Issue],
    sessions: &[WorkerSession],
    prs: &[PullRequest],
    specs: &[Spec],
    worktrees: &[Worktree],
) -> EnrichmentResult {
    let index = IssueIndex::build(issues);

    let mut linked_sessions: Vec<Vec<WorkerSession>> = vec![Vec::new(); issues.len()];
    let mut linked_pr: Vec<Option<&PullRequest>> = vec![None; issues.len()];
    let mut linked_spec: Vec<Option<&Spec>> = vec![None; issues.len()];
    let mut linked_worktree: Vec<Option<&Worktree>> = vec![None; issues.len()];
    let mut unlinked = Vec::new();

    for (session, target) in sessions.iter().zip(link_sessions(&index, sessions, worktrees)) {
        match target {
            Some(i) => linked_sessions[i].push(session.clone()),
            None => unlinked.push(UnlinkedItem::Session {
                badge: session_badge(session.status),
                session: session.clone(),
            }),
        }
    }

    // Superseded PRs still count as linked; they are just not displayed
    for (pr, target) in prs.iter().zip(link_prs(&index, prs)) {
        match target {
            Some(i) => {
                if linked_pr[i].is_none_or(|current| pr.updated_at > current.updated_at) {
                    linked_pr[i] = Some(pr);
                }
            }
            None => {
                unlinked.push(UnlinkedItem::PullRequest { badge: pr_badge(pr), pr: pr.clone() });
            }
        }
    }

    for (spec, target) in specs.iter().zip(link_specs(&index, specs)) {
        if let Some(i) = target {
            if linked_spec[i].is_none_or(|current| spec.updated_at > current.updated_at) {
                linked_spec[i] = Some(spec);
            }
        }
    }

    for (worktree, target) in worktrees.iter().zip(link_worktrees(&index, worktrees)) {
        if let Some(i) = target {
            linked_worktree[i].get_or_insert(worktree);
        }
    }

    let mut enriched: Vec<EnrichedIssue> = issues
        .iter()
        .zip(linked_sessions)
        .enumerate()
        .map(|(i, (issue, sessions))| {
            let pr = linked_pr[i];
            let spec = linked_spec[i];
            EnrichedIssue {
                section: assign_section(issue, &sessions, pr, spec),
                badge: resolve_badge(&sessions, pr, spec),
                issue: issue.clone(),
                sessions,
                pr: pr.cloned(),
                spec: spec.cloned(),
                worktree: linked_worktree[i].cloned(),
            }
        })
        .collect();

    sort_issues(&mut enriched);
    tracing::debug!(
        issues = enriched.len(),
        unlinked = unlinked.len(),
        "Enrichment pass complete"
    );

    EnrichmentResult { issues: enriched, unlinked }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::{CiStatus, IssueStateType, PrState};
    use crate::session::{SessionStatus, SpecStatus};
    use crate::test_support::{at, issue, pr, session, spec, worktree};

    #[test]
    fn test_approval_session_drives_section_and_badge() {
        let issues = vec![issue("AUTH-142", IssueStateType::Started)];
        let worktrees = vec![worktree("/wt/auth", "feature/auth-142-fix")];
        let sessions = vec![session("s1", "/wt/auth", SessionStatus::Approval)];
        let mut failing = pr(9, "feature/auth-142-fix", PrState::Open);
        failing.ci_status = CiStatus::Fail;
        let specs = vec![spec("sp", Some("auth-142"), SpecStatus::Pending)];

        let result = enrich(&issues, &sessions, &[failing], &specs, &worktrees);
        let item = &result.issues[0];
        assert_eq!(item.section, Section::Attention);
        assert_eq!(item.badge, Badge::Approval);
        assert_eq!(item.sessions.len(), 1);
        assert!(item.pr.is_some());
        assert!(item.spec.is_some());
        assert_eq!(item.worktree.as_ref().unwrap().path, std::path::PathBuf::from("/wt/auth"));
        assert!(result.unlinked.is_empty());
    }

    #[test]
    fn test_latest_pr_wins_but_all_matches_are_linked() {
        let issues = vec![issue("ENG-7", IssueStateType::Backlog)];
        let mut older = pr(1, "eng-7-a", PrState::Open);
        older.updated_at = at(-10);
        let mut newer = pr(2, "feature/eng-7-b", PrState::Draft);
        newer.updated_at = at(5);
        let stray = pr(3, "docs", PrState::Open);

        let result = enrich(&issues, &[], &[older, newer, stray], &[], &[]);
        assert_eq!(result.issues[0].pr.as_ref().unwrap().number.get(), 2);
        assert_eq!(result.unlinked.len(), 1);
        assert!(matches!(&result.unlinked[0], UnlinkedItem::PullRequest { pr, badge }
            if pr.number.get() == 3 && *badge == Badge::Review));
    }

    #[test]
    fn test_unlinked_sessions_keep_own_badge() {
        let sessions = vec![session("s1", "/nowhere", SessionStatus::Error)];
        let result = enrich(&[], &sessions, &[], &[], &[]);
        assert!(result.issues.is_empty());
        assert_eq!(result.unlinked.len(), 1);
        assert_eq!(result.unlinked[0].badge(), Badge::Error);
    }

    #[test]
    fn test_latest_spec_and_first_worktree() {
        let issues = vec![issue("ENG-7", IssueStateType::Backlog)];
        let mut old_spec = spec("old", Some("ENG-7"), SpecStatus::Pending);
        old_spec.updated_at = at(-5);
        let new_spec = spec("new", Some("eng-7"), SpecStatus::Approved);
        let worktrees = vec![worktree("/a", "eng-7"), worktree("/b", "feature/eng-7-x")];

        let result = enrich(&issues, &[], &[], &[old_spec, new_spec], &worktrees);
        let item = &result.issues[0];
        assert_eq!(item.spec.as_ref().unwrap().id.as_str(), "new");
        assert_eq!(item.section, Section::Backlog);
        assert_eq!(item.worktree.as_ref().unwrap().path, std::path::PathBuf::from("/a"));
    }

    #[test]
    fn test_empty_inputs_render_empty_model() {
        let result = EnrichmentInputs::default().enrich();
        assert!(result.issues.is_empty());
        assert!(result.unlinked.is_empty());
        assert_eq!(result.section(Section::Backlog).count(), 0);
    }
}
