//! Cross-session notification aggregation.
//!
//! One live notice per (session, kind): a repeat notice replaces the old
//! one instead of stacking. Display order puts approval requests first,
//! then everything else, newest first within each tier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::SessionId;

/// Kind of notice raised for the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A session is blocked waiting for the operator
    ApprovalNeeded,
    /// A session hit an error
    Error,
    /// A session finished a unit of work
    Completed,
}

impl NotificationKind {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ApprovalNeeded => "approval_needed",
            Self::Error => "error",
            Self::Completed => "completed",
        }
    }

    /// Display tier; lower sorts first.
    const fn tier(self) -> u8 {
        match self {
            Self::ApprovalNeeded => 0,
            Self::Error | Self::Completed => 1,
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A notice about one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Session the notice is about
    pub session_id: SessionId,
    /// Notice kind
    pub kind: NotificationKind,
    /// Human readable message
    pub message: String,
    /// When the notice was raised
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(session_id: SessionId, kind: NotificationKind, message: impl Into<String>) -> Self {
        Self { session_id, kind, message: message.into(), timestamp: Utc::now() }
    }

    /// Override the timestamp.
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Deduplicating notice collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAggregator {
    notifications: Vec<Notification>,
    #[serde(default)]
    max_per_session: Option<usize>,
}

impl NotificationAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of live notices kept for any one session.
    ///
    /// Dedup already bounds a session to one notice per kind, so only caps
    /// below the number of kinds evict. Approval requests are never evicted
    /// for a less urgent notice.
    pub fn with_max_per_session(limit: usize) -> Self {
        Self { notifications: Vec::new(), max_per_session: Some(limit.max(1)) }
    }

    /// Add a notice, replacing any live notice of the same kind for the
    /// same session.
    pub fn push(&mut self, notification: Notification) {
        if let Some(existing) = self
            .notifications
            .iter_mut()
            .find(|n| n.session_id == notification.session_id && n.kind == notification.kind)
        {
            *existing = notification;
            return;
        }

        if let Some(limit) = self.max_per_session {
            let live = self.for_session(&notification.session_id).count();
            if live >= limit {
                // Evict the oldest notice of the least urgent tier, never one
                // more urgent than the incoming notice
                let victim = self
                    .notifications
                    .iter()
                    .enumerate()
                    .filter(|(_, n)| n.session_id == notification.session_id)
                    .max_by(|(_, a), (_, b)| {
                        a.kind
                            .tier()
                            .cmp(&b.kind.tier())
                            .then_with(|| b.timestamp.cmp(&a.timestamp))
                    })
                    .filter(|(_, n)| n.kind.tier() >= notification.kind.tier())
                    .map(|(i, _)| i);
                match victim {
                    Some(index) => {
                        self.notifications.remove(index);
                    }
                    None => return,
                }
            }
        }

        self.notifications.push(notification);
    }

    /// Remove the notice of `kind` for `session`. Returns whether one existed.
    pub fn dismiss(&mut self, session: &SessionId, kind: NotificationKind) -> bool {
        let before = self.notifications.len();
        self.notifications.retain(|n| !(n.session_id == *session && n.kind == kind));
        self.notifications.len() != before
    }

    /// Remove every notice for `session`.
    pub fn clear_session(&mut self, session: &SessionId) -> usize {
        let before = self.notifications.len();
        self.notifications.retain(|n| n.session_id != *session);
        before - self.notifications.len()
    }

    pub fn get(&self, session: &SessionId, kind: NotificationKind) -> Option<&Notification> {
        self.notifications.iter().find(|n| n.session_id == *session && n.kind == kind)
    }

    pub fn for_session<'a>(
        &'a self,
        session: &'a SessionId,
    ) -> impl Iterator<Item = &'a Notification> + 'a {
        self.notifications.iter().filter(move |n| n.session_id == *session)
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }

    /// Notices in display order.
    pub fn ordered(&self) -> Vec<&Notification> {
        let mut ordered: Vec<_> = self.notifications.iter().collect();
        ordered.sort_by(|a, b| {
            a.kind.tier().cmp(&b.kind.tier()).then_with(|| b.timestamp.cmp(&a.timestamp))
        });
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sid(s: &str) -> SessionId {
        SessionId::new(s).unwrap()
    }

    #[test]
    fn test_same_kind_replaces() {
        let mut agg = NotificationAggregator::new();
        agg.push(Notification::new(sid("a"), NotificationKind::Error, "first"));
        agg.push(Notification::new(sid("a"), NotificationKind::Error, "second"));
        agg.push(Notification::new(sid("b"), NotificationKind::Error, "other"));

        assert_eq!(agg.len(), 2);
        assert_eq!(agg.get(&sid("a"), NotificationKind::Error).unwrap().message, "second");
    }

    #[test]
    fn test_approval_tier_precedes_newer_notices() {
        let now = Utc::now();
        let mut agg = NotificationAggregator::new();
        agg.push(Notification::new(sid("a"), NotificationKind::Error, "err").at(now));
        agg.push(
            Notification::new(sid("b"), NotificationKind::ApprovalNeeded, "old approval")
                .at(now - Duration::minutes(10)),
        );
        agg.push(
            Notification::new(sid("c"), NotificationKind::ApprovalNeeded, "new approval")
                .at(now - Duration::minutes(1)),
        );
        agg.push(
            Notification::new(sid("d"), NotificationKind::Completed, "done")
                .at(now - Duration::minutes(5)),
        );

        let messages: Vec<_> = agg.ordered().iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, vec!["new approval", "old approval", "err", "done"]);
    }

    #[test]
    fn test_dismiss_and_clear() {
        let mut agg = NotificationAggregator::new();
        agg.push(Notification::new(sid("a"), NotificationKind::Error, "e"));
        agg.push(Notification::new(sid("a"), NotificationKind::Completed, "c"));
        agg.push(Notification::new(sid("b"), NotificationKind::Error, "e"));

        assert!(agg.dismiss(&sid("a"), NotificationKind::Error));
        assert!(!agg.dismiss(&sid("a"), NotificationKind::Error));
        assert_eq!(agg.clear_session(&sid("a")), 1);
        assert_eq!(agg.len(), 1);
        assert_eq!(agg.for_session(&sid("b")).count(), 1);
    }

    #[test]
    fn test_max_per_session_evicts_oldest() {
        let now = Utc::now();
        let mut agg = NotificationAggregator::with_max_per_session(2);
        agg.push(
            Notification::new(sid("a"), NotificationKind::Error, "e").at(now - Duration::hours(1)),
        );
        agg.push(Notification::new(sid("a"), NotificationKind::Completed, "c").at(now));
        agg.push(Notification::new(sid("a"), NotificationKind::ApprovalNeeded, "p").at(now));

        assert_eq!(agg.len(), 2);
        assert!(agg.get(&sid("a"), NotificationKind::Error).is_none());
    }

    #[test]
    fn test_cap_never_evicts_approval_for_lower_tier() {
        let now = Utc::now();
        let mut agg = NotificationAggregator::with_max_per_session(1);
        agg.push(
            Notification::new(sid("a"), NotificationKind::ApprovalNeeded, "p")
                .at(now - Duration::hours(1)),
        );
        agg.push(Notification::new(sid("a"), NotificationKind::Error, "e").at(now));

        assert_eq!(agg.len(), 1);
        assert!(agg.get(&sid("a"), NotificationKind::ApprovalNeeded).is_some());
        assert!(agg.get(&sid("a"), NotificationKind::Error).is_none());

        // An approval displaces a lower tier notice
        let mut agg = NotificationAggregator::with_max_per_session(1);
        agg.push(Notification::new(sid("b"), NotificationKind::Completed, "c").at(now));
        agg.push(Notification::new(sid("b"), NotificationKind::ApprovalNeeded, "p").at(now));
        assert_eq!(agg.len(), 1);
        assert!(agg.get(&sid("b"), NotificationKind::ApprovalNeeded).is_some());
    }

    #[test]
    fn test_cap_of_two_keeps_approval_over_newer_notices() {
        let now = Utc::now();
        let mut agg = NotificationAggregator::with_max_per_session(2);
        agg.push(
            Notification::new(sid("a"), NotificationKind::ApprovalNeeded, "p")
                .at(now - Duration::hours(2)),
        );
        agg.push(
            Notification::new(sid("a"), NotificationKind::Error, "e").at(now - Duration::hours(1)),
        );
        agg.push(Notification::new(sid("a"), NotificationKind::Completed, "c").at(now));

        assert_eq!(agg.len(), 2);
        assert!(agg.get(&sid("a"), NotificationKind::ApprovalNeeded).is_some());
        assert!(agg.get(&sid("a"), NotificationKind::Error).is_none());
    }
}
