//! Write-ahead log.
//!
//! One line per transaction: `<sha256 hex> <json>`. A line whose checksum
//! does not match its payload (a torn write) is skipped on replay.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::error::StateResult;
use super::ops::Operation;

/// A logged transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Position in the writer's sequence
    pub seq: u64,
    /// Transaction ID
    pub transaction: Uuid,
    /// When the entry was written
    pub timestamp: DateTime<Utc>,
    /// Operations, in application order
    pub operations: Vec<Operation>,
}

/// SHA-256 of a payload as lowercase hex.
pub fn checksum(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Serialize an entry to one newline-terminated log line.
pub fn encode_line(entry: &WalEntry) -> StateResult<String> {
    let payload = serde_json::to_string(entry)?;
    Ok(format!("{} {}\n", checksum(&payload), payload))
}

/// Parse one log line, explaining why it was rejected.
pub fn decode_line(line: &str) -> Result<WalEntry, String> {
    let (sum, payload) = line.split_once(' ').ok_or("missing checksum")?;
    if checksum(payload) != sum {
        return Err("checksum mismatch".to_string());
    }
    serde_json::from_str(payload).map_err(|e| e.to_string())
}

/// The log file paired with a state document.
#[derive(Debug, Clone)]
pub struct WriteAheadLog {
    path: PathBuf,
}

impl WriteAheadLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<state path>.wal`
    pub fn for_state(state_path: &Path) -> Self {
        let mut name = state_path.as_os_str().to_owned();
        name.push(".wal");
        Self::new(name)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry and flush it to disk.
    pub async fn append(&self, entry: &WalEntry) -> StateResult<()> {
        let line = encode_line(entry)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file =
            tokio::fs::OpenOptions::new().create(true).append(true).open(&self.path).await?;
        file.write_all(line.as_bytes()).await?;
        file.sync_data().await?;
        Ok(())
    }

    /// Every intact entry, in file order. A missing log is empty.
    ///
    /// Lines that are not valid UTF-8 (a write torn inside a multi-byte
    /// character) are skipped like checksum mismatches.
    pub async fn read_entries(&self) -> StateResult<Vec<WalEntry>> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for (number, raw) in content.split(|b| *b == b'\n').enumerate() {
            let decoded = std::str::from_utf8(raw)
                .map_err(|e| format!("invalid UTF-8: {e}"))
                .and_then(|line| {
                    let line = line.trim_end_matches('\r');
                    if line.trim().is_empty() {
                        Ok(None)
                    } else {
                        decode_line(line).map(Some)
                    }
                });
            match decoded {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(reason) => {
                    tracing::warn!(
                        path = ?self.path,
                        line = number + 1,
                        reason = %reason,
                        "Skipping corrupt WAL entry"
                    );
                }
            }
        }
        Ok(entries)
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Remove the log. Removing a missing log succeeds.
    pub async fn clear(&self) -> StateResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
