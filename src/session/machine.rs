//! Transition tables and validators.
//!
//! Both the worker-session and spec machines share one validator shape:
//! a static table of allowed targets per state, a boolean check, and a
//! validating call that reports the machine, source and target on refusal.

use super::status::{SessionStatus, SpecStatus};

/// An illegal state-machine move. Never silently coerced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {machine} transition: {from} -> {to}")]
pub struct TransitionError {
    /// Which machine rejected the move
    pub machine: &'static str,
    /// State the move started from
    pub from: String,
    /// Requested target state
    pub to: String,
}

/// A finite state machine over a copyable status type.
pub trait StateMachine: Copy + Eq + std::fmt::Display + 'static {
    /// Machine name used in error reports.
    const MACHINE: &'static str;

    /// States reachable from `self` in one move.
    fn allowed_targets(self) -> &'static [Self];

    fn can_transition_to(self, to: Self) -> bool {
        self.allowed_targets().contains(&to)
    }
}

/// Check a move against a machine's table.
pub fn validate_transition<M: StateMachine>(from: M, to: M) -> Result<(), TransitionError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(TransitionError { machine: M::MACHINE, from: from.to_string(), to: to.to_string() })
    }
}

const WORKER_TRANSITIONS: &[(SessionStatus, &[SessionStatus])] = &[
    (
        SessionStatus::Starting,
        &[SessionStatus::Idle, SessionStatus::Error, SessionStatus::Shutdown],
    ),
    (SessionStatus::Idle, &[SessionStatus::Working, SessionStatus::Shutdown]),
    (
        SessionStatus::Working,
        &[
            SessionStatus::Idle,
            SessionStatus::Approval,
            SessionStatus::Error,
            SessionStatus::Shutdown,
        ],
    ),
    (
        SessionStatus::Approval,
        &[SessionStatus::Working, SessionStatus::Error, SessionStatus::Shutdown],
    ),
    (SessionStatus::Error, &[SessionStatus::Idle, SessionStatus::Shutdown]),
    // Shutdown is terminal
    (SessionStatus::Shutdown, &[]),
];

const SPEC_TRANSITIONS: &[(SpecStatus, &[SpecStatus])] = &[
    (SpecStatus::Draft, &[SpecStatus::Pending]),
    (SpecStatus::Pending, &[SpecStatus::Approved, SpecStatus::Denied]),
    // Review outcomes reopen the draft; there is no closed state
    (SpecStatus::Approved, &[SpecStatus::Draft]),
    (SpecStatus::Denied, &[SpecStatus::Draft]),
];

fn lookup<S: PartialEq + 'static>(table: &'static [(S, &'static [S])], from: &S) -> &'static [S] {
    table.iter().find(|(state, _)| state == from).map_or(&[], |(_, targets)| *targets)
}

impl StateMachine for SessionStatus {
    const MACHINE: &'static str = "worker session";

    fn allowed_targets(self) -> &'static [Self] {
        lookup(WORKER_TRANSITIONS, &self)
    }
}

impl StateMachine for SpecStatus {
    const MACHINE: &'static str = "spec";

    fn allowed_targets(self) -> &'static [Self] {
        lookup(SPEC_TRANSITIONS, &self)
    }
}

pub fn is_valid_worker_transition(from: SessionStatus, to: SessionStatus) -> bool {
    from.can_transition_to(to)
}

pub fn validate_worker_transition(
    from: SessionStatus,
    to: SessionStatus,
) -> Result<(), TransitionError> {
    validate_transition(from, to)
}

pub fn is_valid_spec_transition(from: SpecStatus, to: SpecStatus) -> bool {
    from.can_transition_to(to)
}

pub fn validate_spec_transition(from: SpecStatus, to: SpecStatus) -> Result<(), TransitionError> {
    validate_transition(from, to)
}
