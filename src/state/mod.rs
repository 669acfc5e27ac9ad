//! Durable state manager.
//!
//! A generic JSON-backed value with transactional updates, a checksummed
//! write-ahead log for crash recovery, bounded snapshot history and
//! advisory locks.

mod error;
mod lock;
mod manager;
mod ops;
mod snapshot;
mod wal;

pub use error::{StateError, StateResult};
pub use lock::{LockTable, StateLock};
pub use manager::{
    StateEvent, StateManager, StateOptions, StateTransaction, SubscriptionId, Validator,
};
pub use ops::{apply, apply_all, deep_merge, get_path, parse_path, Operation};
pub use snapshot::{SnapshotHistory, SnapshotId, StateSnapshot};
pub use wal::{checksum, decode_line, encode_line, WalEntry, WriteAheadLog};
