//! Advisory locks.
//!
//! A lock is a hint for external callers coordinating multi-step updates.
//! It never blocks a transaction. Locks expire on their own so a crashed
//! holder cannot wedge other writers.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{StateError, StateResult};

/// A held advisory lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateLock {
    /// Lock name
    pub name: String,
    /// Logical writer holding the lock
    pub holder: String,
    /// When the lock was first taken
    pub acquired_at: DateTime<Utc>,
    /// When the lock lapses
    pub expires_at: DateTime<Utc>,
}

impl StateLock {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Named locks with expiry.
#[derive(Debug, Clone, Default)]
pub struct LockTable {
    locks: HashMap<String, StateLock>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take `name` for `holder`.
    ///
    /// Succeeds when the lock is free, expired, or already held by the same
    /// holder (which refreshes the expiry).
    pub fn acquire(
        &mut self,
        name: &str,
        holder: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> StateResult<StateLock> {
        if let Some(existing) = self.locks.get_mut(name) {
            if existing.holder == holder {
                existing.expires_at = expiry(now, ttl);
                return Ok(existing.clone());
            }
            if !existing.is_expired_at(now) {
                return Err(StateError::LockHeld {
                    name: name.to_string(),
                    holder: existing.holder.clone(),
                });
            }
            tracing::warn!(
                lock = %name,
                holder = %existing.holder,
                "Taking over expired lock"
            );
        }

        let lock = StateLock {
            name: name.to_string(),
            holder: holder.to_string(),
            acquired_at: now,
            expires_at: expiry(now, ttl),
        };
        self.locks.insert(name.to_string(), lock.clone());
        Ok(lock)
    }

    /// Release `name` if `holder` owns it and it has not expired.
    pub fn release(&mut self, name: &str, holder: &str, now: DateTime<Utc>) -> StateResult<()> {
        match self.locks.get(name) {
            Some(lock) if lock.holder == holder && !lock.is_expired_at(now) => {
                self.locks.remove(name);
                Ok(())
            }
            _ => Err(StateError::LockNotHeld {
                name: name.to_string(),
                holder: holder.to_string(),
            }),
        }
    }

    /// The live lock on `name`, if any.
    pub fn get(&self, name: &str, now: DateTime<Utc>) -> Option<&StateLock> {
        self.locks.get(name).filter(|lock| !lock.is_expired_at(now))
    }

    /// Drop expired entries, returning how many were removed.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| !lock.is_expired_at(now));
        before - self.locks.len()
    }

    pub fn clear(&mut self) {
        self.locks.clear();
    }
}
