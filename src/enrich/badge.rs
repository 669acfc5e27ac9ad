//! Badge ranking and resolution.
//!
//! Every signal linked to an issue proposes candidate badges; the one with
//! the lowest rank in the fixed table wins.

use serde::{Serialize, Serializer};

use crate::integrations::{CiStatus, PrState, PullRequest, Spec};
use crate::session::{SessionStatus, SpecStatus, WorkerSession};

/// Short status label, ordered by urgency (rank 0 first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Badge {
    Approval,
    Error,
    Done,
    Working,
    Review,
    CiFail,
    Spec,
    Idle,
    Draft,
    CiPass,
    Merged,
    /// No signal
    None,
}

impl Badge {
    /// The full table in rank order.
    pub const ALL: [Self; 12] = [
        Self::Approval,
        Self::Error,
        Self::Done,
        Self::Working,
        Self::Review,
        Self::CiFail,
        Self::Spec,
        Self::Idle,
        Self::Draft,
        Self::CiPass,
        Self::Merged,
        Self::None,
    ];

    #[must_use]
    pub const fn priority(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Approval => "apprvl",
            Self::Error => "error",
            Self::Done => "done",
            Self::Working => "wrkng",
            Self::Review => "review",
            Self::CiFail => "ci:fail",
            Self::Spec => "spec",
            Self::Idle => "idle",
            Self::Draft => "draft",
            Self::CiPass => "ci:pass",
            Self::Merged => "merged",
            Self::None => "--",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.label() == label)
    }
}

impl std::fmt::Display for Badge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.label())
    }
}

impl Serialize for Badge {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// The badge a single session status proposes.
pub fn session_badge(status: SessionStatus) -> Badge {
    match status {
        SessionStatus::Approval => Badge::Approval,
        SessionStatus::Error => Badge::Error,
        SessionStatus::Shutdown => Badge::Done,
        SessionStatus::Working => Badge::Working,
        SessionStatus::Idle | SessionStatus::Starting => Badge::Idle,
    }
}

/// Every badge a pull request proposes.
pub fn pr_badges(pr: &PullRequest) -> Vec<Badge> {
    let mut badges = Vec::with_capacity(2);
    if pr.ci_status == CiStatus::Fail {
        badges.push(Badge::CiFail);
    }
    match pr.state {
        PrState::Merged => badges.push(Badge::Merged),
        PrState::Open => badges.push(Badge::Review),
        PrState::Draft => badges.push(Badge::Draft),
        PrState::Closed => {}
    }
    if pr.ci_status == CiStatus::Pass && pr.state != PrState::Merged {
        badges.push(Badge::CiPass);
    }
    badges
}

/// The most urgent badge a pull request proposes on its own.
pub fn pr_badge(pr: &PullRequest) -> Badge {
    pr_badges(pr).into_iter().min().unwrap_or(Badge::None)
}

/// Resolve the badge for an issue from all of its linked signals.
pub fn resolve_badge(
    sessions: &[WorkerSession],
    pr: Option<&PullRequest>,
    spec: Option<&Spec>,
) -> Badge {
    let session_candidates = sessions.iter().map(|s| session_badge(s.status));
    let pr_candidates = pr.map(pr_badges).unwrap_or_default();
    let spec_candidate = spec.filter(|s| s.status == SpecStatus::Pending).map(|_| Badge::Spec);

    session_candidates
        .chain(pr_candidates)
        .chain(spec_candidate)
        .min()
        .unwrap_or(Badge::None)
}
