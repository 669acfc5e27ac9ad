//! Transactional, crash-recoverable state document.
//!
//! Every mutation goes through [`StateManager::execute_transaction`]:
//!
//! 1. apply the operations to a copy of the current value
//! 2. run the validator, if any
//! 3. append the transaction to the WAL
//! 4. write `<path>.tmp` and rename it over `<path>`, keeping `<path>.bak`
//! 5. swap the in-memory value and notify listeners
//!
//! The in-memory value only changes after step 4 succeeds, so a failed
//! transaction is never visible. Transactions on one manager are serialized.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::error::{StateError, StateResult};
use super::lock::{LockTable, StateLock};
use super::ops::{self, Operation};
use super::snapshot::{SnapshotHistory, SnapshotId, StateSnapshot};
use super::wal::{WalEntry, WriteAheadLog};
use crate::core::StateConfig;

/// Accepts or rejects a candidate value before it is written.
pub type Validator<T> = Arc<dyn Fn(&T) -> Result<(), String> + Send + Sync>;

type Listener<T> = Arc<dyn Fn(&StateEvent<T>) + Send + Sync>;

/// Handle for removing a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Delivered to listeners after every transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent<T> {
    Committed { transaction: Uuid, value: T },
    Failed { transaction: Uuid, error: String },
}

/// A transaction as it moves through the commit pipeline.
#[derive(Debug, Clone)]
pub struct StateTransaction<T> {
    /// Transaction ID
    pub id: Uuid,
    /// Value before any operation ran
    pub previous: T,
    /// Operations, in application order
    pub operations: Vec<Operation>,
    /// Whether the new value reached disk
    pub committed: bool,
}

/// Manager settings.
pub struct StateOptions<T> {
    /// Automatic per-commit snapshots kept for rollback
    pub max_history: usize,
    /// Labelled snapshots from `create_snapshot`, bounded separately
    pub max_checkpoints: usize,
    /// Default advisory lock lifetime
    pub lock_ttl: Duration,
    validator: Option<Validator<T>>,
}

impl<T> Default for StateOptions<T> {
    fn default() -> Self {
        Self {
            max_history: 50,
            max_checkpoints: 20,
            lock_ttl: Duration::from_secs(30),
            validator: None,
        }
    }
}

impl<T> StateOptions<T> {
    pub fn from_config(config: &StateConfig) -> Self {
        Self {
            max_history: config.max_history,
            max_checkpoints: config.max_checkpoints,
            lock_ttl: config.lock_ttl(),
            validator: None,
        }
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    pub fn with_max_checkpoints(mut self, max_checkpoints: usize) -> Self {
        self.max_checkpoints = max_checkpoints;
        self
    }

    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&T) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }
}

struct Writer {
    seq: u64,
}

/// A durable value of type `T` stored as a JSON document.
pub struct StateManager<T> {
    path: PathBuf,
    wal: WriteAheadLog,
    current: RwLock<T>,
    writer: tokio::sync::Mutex<Writer>,
    history: Mutex<SnapshotHistory<T>>,
    checkpoints: Mutex<SnapshotHistory<T>>,
    locks: Mutex<LockTable>,
    listeners: Mutex<Vec<(SubscriptionId, Listener<T>)>>,
    next_subscription: AtomicU64,
    closed: AtomicBool,
    validator: Option<Validator<T>>,
    lock_ttl: Duration,
}

impl<T> std::fmt::Debug for StateManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateManager")
            .field("path", &self.path)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

async fn read_document<T: DeserializeOwned>(path: &Path) -> StateResult<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

enum Checkpoint<T> {
    Missing,
    Primary(T),
    Backup(T),
}

/// Load the checkpoint, falling back to the backup when it is unreadable.
async fn load_checkpoint<T: DeserializeOwned>(path: &Path) -> StateResult<Checkpoint<T>> {
    match read_document(path).await {
        Ok(Some(document)) => Ok(Checkpoint::Primary(document)),
        Ok(None) => Ok(Checkpoint::Missing),
        Err(e) => match read_document(&sibling(path, ".bak")).await {
            Ok(Some(document)) => {
                tracing::warn!(path = ?path, error = %e, "State file unreadable, using backup");
                Ok(Checkpoint::Backup(document))
            }
            _ => Err(e),
        },
    }
}

async fn write_then_rename(tmp: &Path, path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(tmp).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(tmp, path).await
}

/// Atomically replace the document at `path`.
///
/// The previous document is copied to `<path>.bak` first and copied back
/// if the write fails.
async fn persist<T: Serialize>(path: &Path, value: &T) -> StateResult<()> {
    let data = serde_json::to_vec_pretty(value)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let backup = sibling(path, ".bak");
    let had_previous = tokio::fs::try_exists(path).await?;
    if had_previous {
        tokio::fs::copy(path, &backup).await?;
    }

    let tmp = sibling(path, ".tmp");
    if let Err(e) = write_then_rename(&tmp, path, &data).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        if had_previous {
            if let Err(restore) = tokio::fs::copy(&backup, path).await {
                tracing::error!(path = ?path, error = %restore, "Failed to restore state backup");
            }
        }
        tracing::error!(path = ?path, error = %e, "Failed to persist state");
        return Err(e.into());
    }
    Ok(())
}

/// Apply logged transactions on top of a checkpoint.
///
/// An entry that no longer applies is skipped; the rest still replay.
fn replay<T>(checkpoint: &T, entries: &[WalEntry]) -> StateResult<T>
where
    T: Serialize + DeserializeOwned,
{
    let mut value = serde_json::to_value(checkpoint)?;
    for entry in entries {
        let mut candidate = value.clone();
        match ops::apply_all(&mut candidate, &entry.operations) {
            Ok(()) => value = candidate,
            Err(e) => {
                tracing::warn!(
                    transaction = %entry.transaction,
                    error = %e,
                    "Skipping WAL entry that no longer applies"
                );
            }
        }
    }
    Ok(serde_json::from_value(value)?)
}

impl<T> StateManager<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Open the document at `path`, recovering any logged transactions.
    ///
    /// A missing document starts from `initial` and is written immediately;
    /// an unreadable one is rebuilt from `<path>.bak`.
    pub async fn open(
        path: impl Into<PathBuf>,
        initial: T,
        options: StateOptions<T>,
    ) -> StateResult<Self> {
        let path = path.into();
        let wal = WriteAheadLog::for_state(&path);

        let (checkpoint, rewrite) = match load_checkpoint::<T>(&path).await? {
            Checkpoint::Primary(document) => (document, false),
            Checkpoint::Backup(document) => (document, true),
            Checkpoint::Missing => (initial, true),
        };

        let pending = wal.read_entries().await?;
        let seq = pending.iter().map(|e| e.seq).max().unwrap_or(0);
        let current =
            if pending.is_empty() { checkpoint } else { replay(&checkpoint, &pending)? };

        if rewrite || !pending.is_empty() {
            persist(&path, &current).await?;
        }
        wal.clear().await?;

        if !pending.is_empty() {
            tracing::info!(path = ?path, entries = pending.len(), "Recovered state from WAL");
        }

        Ok(Self {
            path,
            wal,
            current: RwLock::new(current),
            writer: tokio::sync::Mutex::new(Writer { seq }),
            history: Mutex::new(SnapshotHistory::new(options.max_history)),
            checkpoints: Mutex::new(SnapshotHistory::new(options.max_checkpoints)),
            locks: Mutex::new(LockTable::new()),
            listeners: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            validator: options.validator,
            lock_ttl: options.lock_ttl,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn wal_path(&self) -> &Path {
        self.wal.path()
    }

    /// A copy of the current value.
    pub fn get(&self) -> T {
        self.current.read().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> StateResult<()> {
        if self.is_closed() {
            return Err(StateError::Closed);
        }
        Ok(())
    }

    /// Apply `operations` atomically and durably, returning the new value.
    pub async fn execute_transaction(&self, operations: Vec<Operation>) -> StateResult<T> {
        self.ensure_open()?;
        let mut writer = self.writer.lock().await;
        self.ensure_open()?;

        let mut transaction = StateTransaction {
            id: Uuid::new_v4(),
            previous: self.get(),
            operations,
            committed: false,
        };

        match self.commit(&transaction, &mut writer).await {
            Ok(next) => {
                transaction.committed = true;
                *self.current.write() = next.clone();
                tracing::debug!(
                    transaction = %transaction.id,
                    operations = transaction.operations.len(),
                    "Transaction committed"
                );
                self.history.lock().push(StateSnapshot::new(
                    format!("before {}", transaction.id),
                    transaction.previous,
                ));
                self.notify(&StateEvent::Committed {
                    transaction: transaction.id,
                    value: next.clone(),
                });
                Ok(next)
            }
            Err(e) => {
                // The current value was never replaced, so there is nothing to roll back
                tracing::warn!(transaction = %transaction.id, error = %e, "Transaction failed");
                self.notify(&StateEvent::Failed {
                    transaction: transaction.id,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn commit(
        &self,
        transaction: &StateTransaction<T>,
        writer: &mut Writer,
    ) -> StateResult<T> {
        let mut value = serde_json::to_value(&transaction.previous)?;
        ops::apply_all(&mut value, &transaction.operations)?;
        let next: T = serde_json::from_value(value)?;
        if let Some(validate) = &self.validator {
            validate(&next).map_err(StateError::Validation)?;
        }

        writer.seq += 1;
        let entry = WalEntry {
            seq: writer.seq,
            transaction: transaction.id,
            timestamp: Utc::now(),
            operations: transaction.operations.clone(),
        };
        self.wal.append(&entry).await?;

        if let Err(e) = persist(&self.path, &next).await {
            // The transaction did not happen; its entry must not replay
            if let Err(clear) = self.wal.clear().await {
                tracing::error!(path = ?self.wal.path(), error = %clear, "Failed to clear WAL");
            }
            return Err(e);
        }
        if let Err(e) = self.wal.clear().await {
            tracing::warn!(path = ?self.wal.path(), error = %e, "Failed to clear WAL after save");
        }
        Ok(next)
    }

    /// Register a listener for transaction outcomes.
    ///
    /// A panicking listener is logged and skipped; it never fails the
    /// transaction or starves other listeners.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&StateEvent<T>) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    fn notify(&self, event: &StateEvent<T>) {
        let listeners: Vec<(SubscriptionId, Listener<T>)> = self
            .listeners
            .lock()
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();

        for (id, listener) in listeners {
            if panic::catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::warn!(subscription = id.0, "State listener panicked");
            }
        }
    }

    /// Record the current value for later rollback.
    ///
    /// Labelled snapshots live apart from the per-commit ones, so commits
    /// never evict them.
    pub fn create_snapshot(&self, label: impl Into<String>) -> StateResult<SnapshotId> {
        self.ensure_open()?;
        let snapshot = StateSnapshot::new(label, self.get());
        let id = snapshot.id;
        if let Some(evicted) = self.checkpoints.lock().push(snapshot) {
            tracing::debug!(snapshot = %evicted.id, label = %evicted.label, "Evicted checkpoint");
        }
        Ok(id)
    }

    /// Every snapshot, automatic and labelled, oldest first.
    pub fn history(&self) -> Vec<StateSnapshot<T>> {
        let mut all: Vec<_> = self.history.lock().iter().cloned().collect();
        all.extend(self.checkpoints.lock().iter().cloned());
        all.sort_by_key(|snapshot| snapshot.created_at);
        all
    }

    /// Labelled snapshots only, oldest first.
    pub fn checkpoints(&self) -> Vec<StateSnapshot<T>> {
        self.checkpoints.lock().iter().cloned().collect()
    }

    /// Roll back to a snapshot through a normal root `replace` transaction.
    pub async fn restore_snapshot(&self, id: SnapshotId) -> StateResult<T> {
        let value = {
            let checkpoints = self.checkpoints.lock();
            let history = self.history.lock();
            checkpoints
                .get(id)
                .or_else(|| history.get(id))
                .map(|snapshot| serde_json::to_value(&snapshot.value))
                .transpose()?
                .ok_or(StateError::SnapshotNotFound(id))?
        };
        tracing::info!(snapshot = %id, "Restoring state snapshot");
        self.execute_transaction(vec![Operation::replace("", value)]).await
    }

    /// Take an advisory lock; `ttl` defaults to the configured lifetime.
    pub fn acquire_lock(
        &self,
        name: &str,
        holder: &str,
        ttl: Option<Duration>,
    ) -> StateResult<StateLock> {
        self.ensure_open()?;
        self.locks.lock().acquire(name, holder, ttl.unwrap_or(self.lock_ttl), Utc::now())
    }

    pub fn release_lock(&self, name: &str, holder: &str) -> StateResult<()> {
        self.locks.lock().release(name, holder, Utc::now())
    }

    /// Current holder of a live lock.
    pub fn lock_holder(&self, name: &str) -> Option<String> {
        self.locks.lock().get(name, Utc::now()).map(|lock| lock.holder.clone())
    }

    /// Wait for any in-flight transaction, then refuse further work.
    pub async fn close(&self) {
        let _writer = self.writer.lock().await;
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.listeners.lock().clear();
        self.locks.lock().clear();
        tracing::debug!(path = ?self.path, "State manager closed");
    }
}
