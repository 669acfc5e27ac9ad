//! Section assignment and dashboard ordering.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EnrichedIssue;
use crate::integrations::{Issue, IssueStateType, PullRequest, Spec};
use crate::session::{SessionStatus, SpecStatus, WorkerSession};

/// Coarse priority bucket; declaration order is display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Attention,
    Active,
    Backlog,
}

impl Section {
    pub const ALL: [Self; 3] = [Self::Attention, Self::Active, Self::Backlog];

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Attention => "attention",
            Self::Active => "active",
            Self::Backlog => "backlog",
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Pick the section for an issue. The first matching rule wins.
pub fn assign_section(
    issue: &Issue,
    sessions: &[WorkerSession],
    pr: Option<&PullRequest>,
    spec: Option<&Spec>,
) -> Section {
    let any = |status: SessionStatus| sessions.iter().any(|s| s.status == status);
    let issue_closed = issue.state.state_type.is_closed();

    if any(SessionStatus::Approval) || any(SessionStatus::Error) {
        return Section::Attention;
    }
    // A finished session on an issue that is still open needs a look
    if any(SessionStatus::Shutdown) && !issue_closed {
        return Section::Attention;
    }
    if spec.is_some_and(|s| s.status == SpecStatus::Pending) {
        return Section::Attention;
    }
    if any(SessionStatus::Working) || any(SessionStatus::Idle) || any(SessionStatus::Starting) {
        return Section::Active;
    }
    if pr.is_some_and(|p| p.state.is_active()) {
        return Section::Active;
    }
    if issue.state.state_type == IssueStateType::Started {
        return Section::Active;
    }
    Section::Backlog
}

/// Latest timestamp among the issue and everything linked to it.
pub fn last_activity(item: &EnrichedIssue) -> DateTime<Utc> {
    item.sessions
        .iter()
        .map(|s| s.last_activity_at)
        .chain(item.pr.as_ref().map(|p| p.updated_at))
        .fold(item.issue.updated_at, |latest, t| latest.max(t))
}

/// Compare two enriched issues in dashboard order.
pub fn compare(a: &EnrichedIssue, b: &EnrichedIssue) -> Ordering {
    let newest_first = || b.issue.updated_at.cmp(&a.issue.updated_at);

    a.section.cmp(&b.section).then_with(|| match a.section {
        Section::Attention => a.badge.cmp(&b.badge).then_with(newest_first),
        Section::Active => last_activity(b).cmp(&last_activity(a)).then_with(newest_first),
        Section::Backlog => a
            .issue
            .priority
            .sort_rank()
            .cmp(&b.issue.priority.sort_rank())
            .then_with(newest_first),
    })
}

/// Sort enriched issues into dashboard order.
pub fn sort_issues(items: &mut [EnrichedIssue]) {
    items.sort_by(compare);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::Badge;
    use crate::integrations::{PrState, Priority};
    use crate::test_support::{at, issue, pr, session, spec};

    fn enriched(identifier: &str, section: Section) -> EnrichedIssue {
        EnrichedIssue {
            issue: issue(identifier, IssueStateType::Backlog),
            sessions: Vec::new(),
            pr: None,
            spec: None,
            worktree: None,
            section,
            badge: Badge::None,
        }
    }

    #[test]
    fn test_session_attention_outranks_everything() {
        let started = issue("A-1", IssueStateType::Started);
        let sessions = vec![
            session("s1", "/w", SessionStatus::Working),
            session("s2", "/w", SessionStatus::Approval),
        ];
        let open = pr(1, "a-1", PrState::Open);
        assert_eq!(assign_section(&started, &sessions, Some(&open), None), Section::Attention);
    }

    #[test]
    fn test_shutdown_only_needs_attention_while_open() {
        let sessions = vec![session("s1", "/w", SessionStatus::Shutdown)];
        let open = issue("A-1", IssueStateType::Started);
        let done = issue("A-2", IssueStateType::Completed);
        let canceled = issue("A-3", IssueStateType::Canceled);
        assert_eq!(assign_section(&open, &sessions, None, None), Section::Attention);
        assert_eq!(assign_section(&done, &sessions, None, None), Section::Backlog);
        assert_eq!(assign_section(&canceled, &sessions, None, None), Section::Backlog);
    }

    #[test]
    fn test_pending_spec_needs_attention() {
        let backlog = issue("A-1", IssueStateType::Backlog);
        let pending = spec("sp", Some("A-1"), SpecStatus::Pending);
        let draft = spec("sp", Some("A-1"), SpecStatus::Draft);
        assert_eq!(assign_section(&backlog, &[], None, Some(&pending)), Section::Attention);
        assert_eq!(assign_section(&backlog, &[], None, Some(&draft)), Section::Backlog);
    }

    #[test]
    fn test_active_rules() {
        let backlog = issue("A-1", IssueStateType::Backlog);
        let idle = vec![session("s1", "/w", SessionStatus::Starting)];
        assert_eq!(assign_section(&backlog, &idle, None, None), Section::Active);

        let draft = pr(1, "a-1", PrState::Draft);
        assert_eq!(assign_section(&backlog, &[], Some(&draft), None), Section::Active);

        let merged = pr(2, "a-1", PrState::Merged);
        assert_eq!(assign_section(&backlog, &[], Some(&merged), None), Section::Backlog);

        let started = issue("A-2", IssueStateType::Started);
        assert_eq!(assign_section(&started, &[], None, None), Section::Active);
    }

    #[test]
    fn test_sections_sort_in_fixed_order() {
        let mut items = vec![
            enriched("A-1", Section::Backlog),
            enriched("A-2", Section::Active),
            enriched("A-3", Section::Attention),
        ];
        sort_issues(&mut items);
        let sections: Vec<_> = items.iter().map(|i| i.section).collect();
        assert_eq!(sections, vec![Section::Attention, Section::Active, Section::Backlog]);
    }

    #[test]
    fn test_backlog_no_priority_sorts_last() {
        let mut none = enriched("A-1", Section::Backlog);
        none.issue.priority = Priority::NONE;
        let mut low = enriched("A-2", Section::Backlog);
        low.issue.priority = Priority::LOW;
        let mut urgent = enriched("A-3", Section::Backlog);
        urgent.issue.priority = Priority::URGENT;

        let mut items = vec![none, low, urgent];
        sort_issues(&mut items);
        let ids: Vec<_> = items.iter().map(|i| i.issue.identifier.as_str()).collect();
        assert_eq!(ids, vec!["A-3", "A-2", "A-1"]);
    }

    #[test]
    fn test_attention_by_badge_then_recency() {
        let mut error_old = enriched("A-1", Section::Attention);
        error_old.badge = Badge::Error;
        error_old.issue.updated_at = at(-30);
        let mut error_new = enriched("A-2", Section::Attention);
        error_new.badge = Badge::Error;
        error_new.issue.updated_at = at(0);
        let mut approval = enriched("A-3", Section::Attention);
        approval.badge = Badge::Approval;
        approval.issue.updated_at = at(-60);

        let mut items = vec![error_old, error_new, approval];
        sort_issues(&mut items);
        let ids: Vec<_> = items.iter().map(|i| i.issue.identifier.as_str()).collect();
        assert_eq!(ids, vec!["A-3", "A-2", "A-1"]);
    }

    #[test]
    fn test_active_by_most_recent_linked_activity() {
        let mut quiet = enriched("A-1", Section::Active);
        quiet.issue.updated_at = at(-5);
        let mut busy = enriched("A-2", Section::Active);
        busy.issue.updated_at = at(-60);
        let mut s = session("s1", "/w", SessionStatus::Working);
        s.last_activity_at = at(10);
        busy.sessions.push(s);

        assert_eq!(last_activity(&busy), at(10));
        let mut items = vec![quiet, busy];
        sort_issues(&mut items);
        assert_eq!(items[0].issue.identifier.as_str(), "A-2");
    }
}
