//! Fixture builders shared by unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::core::{IssueIdentifier, PrNumber, SessionId, SpecId};
use crate::integrations::{
    CiStatus, Issue, IssueState, IssueStateType, PrState, Priority, PullRequest, Spec, Worktree,
};
use crate::session::{SessionStatus, SpecStatus, WorkerSession};

/// Fixed reference instant, offset by `minutes`.
pub fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
        + Duration::minutes(minutes)
}

pub fn issue(identifier: &str, state_type: IssueStateType) -> Issue {
    let identifier = IssueIdentifier::parse(identifier).unwrap();
    Issue {
        id: format!("id-{}", identifier.as_str().to_lowercase()),
        title: format!("Issue {identifier}"),
        description: None,
        state: IssueState {
            id: format!("{state_type:?}").to_lowercase(),
            name: format!("{state_type:?}"),
            state_type,
        },
        priority: Priority::NONE,
        assignee: None,
        branch_name: None,
        url: format!("https://tracker.example/{identifier}"),
        updated_at: at(0),
        identifier,
    }
}

pub fn session(id: &str, cwd: &str, status: SessionStatus) -> WorkerSession {
    let mut session = WorkerSession::new(SessionId::new(id).unwrap(), id, cwd).with_status(status);
    session.started_at = at(0);
    session.last_activity_at = at(0);
    session
}

pub fn pr(number: u64, head_ref: &str, state: PrState) -> PullRequest {
    PullRequest {
        number: PrNumber::new(number).unwrap(),
        title: format!("PR {number}"),
        author: "ada".to_string(),
        state,
        ci_status: CiStatus::None,
        review_decision: None,
        head_ref: head_ref.to_string(),
        url: format!("https://code.example/pr/{number}"),
        updated_at: at(0),
        ticket_id: None,
    }
}

pub fn spec(id: &str, issue_id: Option<&str>, status: SpecStatus) -> Spec {
    Spec {
        id: SpecId::new(id).unwrap(),
        issue_id: issue_id.map(|i| IssueIdentifier::parse(i).unwrap()),
        status,
        title: format!("Spec {id}"),
        content: String::new(),
        url: format!("https://specs.example/{id}"),
        updated_at: at(0),
    }
}

pub fn worktree(path: &str, branch: &str) -> Worktree {
    Worktree::new(path, branch)
}
