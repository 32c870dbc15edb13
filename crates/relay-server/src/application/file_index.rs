//! FileReceptionIndex: bounded, append-only log of server-persisted files.
//!
//! Populated only by the stream handler when a FILE frame addressed to the
//! server identity is saved to disk; read by the control plane for listing
//! and opening. Records are immutable and never evicted: once the index is
//! full, further insertions are dropped and reported to the caller, who logs
//! and moves on. The file itself still lands on disk.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use thiserror::Error;

/// Error type for index insertion.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FileIndexError {
    /// The index is at capacity; the record was dropped.
    #[error("file index at capacity ({0} records)")]
    IndexFull(usize),
}

/// One persisted file with sender attribution. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFileRecord {
    /// Path the content was stored under on the server.
    pub stored_path: PathBuf,
    /// The filename the sender used in the FILE frame.
    pub original_name: String,
    /// Authenticated campus that sent the file.
    pub sender: String,
    /// When the server persisted the content.
    pub received_at: SystemTime,
}

/// Bounded append-only record table, shared between the stream handlers
/// (writers) and the control plane (reader).
pub struct FileReceptionIndex {
    capacity: usize,
    records: Mutex<Vec<ReceivedFileRecord>>,
}

impl FileReceptionIndex {
    /// Creates an empty index holding at most `capacity` records.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: Mutex::new(Vec::new()),
        }
    }

    /// Appends a record.
    ///
    /// # Errors
    ///
    /// [`FileIndexError::IndexFull`] once `capacity` records exist; the
    /// record is dropped, existing records are untouched.
    pub fn append(&self, record: ReceivedFileRecord) -> Result<(), FileIndexError> {
        let mut records = self.lock();
        if records.len() >= self.capacity {
            return Err(FileIndexError::IndexFull(self.capacity));
        }
        records.push(record);
        Ok(())
    }

    /// Owned copy of all records in insertion order.
    pub fn list(&self) -> Vec<ReceivedFileRecord> {
        self.lock().clone()
    }

    /// The record at `index`, if any. Indexes are positions in insertion
    /// order, as shown by `list()`.
    pub fn get(&self, index: usize) -> Option<ReceivedFileRecord> {
        self.lock().get(index).cloned()
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when no file has been indexed yet.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ReceivedFileRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
