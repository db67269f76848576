use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};

use super::types::{FileId, FileRecord, FileStatus};

/// Error type for tracker operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("File not found: {0}")]
    NotFound(FileId),

    /// A row was reported for a file whose rows are all accounted for.
    #[error("File {0} has no rows remaining")]
    NoRowsRemaining(FileId),

    #[error("File {id} still has {remaining} rows outstanding")]
    RowsOutstanding { id: FileId, remaining: u64 },

    #[error("File {id} already finished with status {status}")]
    AlreadyFinished { id: FileId, status: FileStatus },
}

/// Process-wide file id → progress mapping.
///
/// Each record sits behind its own mutex so counter updates for different
/// files never contend, and every counter change (one count up, remaining
/// down) happens in a single critical section.
#[derive(Debug, Default)]
pub struct FileTracker {
    files: RwLock<HashMap<FileId, Arc<Mutex<FileRecord>>>>,
}

impl FileTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new `Loading` file expecting `total_rows` data rows.
    pub fn create(&self, id: FileId, name: impl Into<String>, total_rows: u64) -> FileRecord {
        let record = FileRecord::new(id, name, total_rows);
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(Mutex::new(record.clone())));
        info!(file_id = %id, name = %record.name, total_rows, "File registered");
        record
    }

    /// Snapshot of a single file.
    pub fn get(&self, id: &FileId) -> Option<FileRecord> {
        let entry = self.entry(id)?;
        let record = lock(&entry).clone();
        Some(record)
    }

    /// Snapshot of every file, each internally consistent.
    pub fn list(&self) -> HashMap<FileId, FileRecord> {
        let entries: Vec<Arc<Mutex<FileRecord>>> = self
            .files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        entries
            .iter()
            .map(|entry| {
                let record = lock(entry).clone();
                (record.id, record)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.files.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of files currently in each status.
    pub fn count_by_status(&self) -> HashMap<FileStatus, usize> {
        let mut counts: HashMap<FileStatus, usize> =
            FileStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for record in self.list().values() {
            *counts.entry(record.status).or_default() += 1;
        }
        counts
    }

    /// Accounts one row as a success.
    pub fn record_success(&self, id: &FileId) -> Result<(), TrackerError> {
        self.account_row(id, |record| record.success_count += 1)
    }

    /// Accounts one row as a failure.
    pub fn record_failure(&self, id: &FileId) -> Result<(), TrackerError> {
        self.account_row(id, |record| record.fail_count += 1)
    }

    /// Moves a fully accounted file from `Loading` to `Success`.
    pub fn finalize(&self, id: &FileId) -> Result<FileStatus, TrackerError> {
        let entry = self.entry(id).ok_or(TrackerError::NotFound(*id))?;
        let mut record = lock(&entry);

        if record.is_finished() {
            return Err(TrackerError::AlreadyFinished {
                id: *id,
                status: record.status,
            });
        }
        if record.remaining_count > 0 {
            return Err(TrackerError::RowsOutstanding {
                id: *id,
                remaining: record.remaining_count,
            });
        }

        record.status = FileStatus::Success;
        record.end_at = Some(Utc::now());
        Ok(record.status)
    }

    /// Ends a `Loading` file early with `TimedOut` or `Cancelled`.
    ///
    /// Counters are left as they are; rows never processed stay in
    /// `remaining_count`.
    pub fn terminate(&self, id: &FileId, status: FileStatus) -> Result<FileStatus, TrackerError> {
        debug_assert!(matches!(
            status,
            FileStatus::TimedOut | FileStatus::Cancelled
        ));
        let entry = self.entry(id).ok_or(TrackerError::NotFound(*id))?;
        let mut record = lock(&entry);

        if record.is_finished() {
            return Err(TrackerError::AlreadyFinished {
                id: *id,
                status: record.status,
            });
        }

        record.status = status;
        record.end_at = Some(Utc::now());
        debug!(file_id = %id, %status, remaining = record.remaining_count, "File terminated");
        Ok(status)
    }

    fn entry(&self, id: &FileId) -> Option<Arc<Mutex<FileRecord>>> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn account_row<F>(&self, id: &FileId, bump: F) -> Result<(), TrackerError>
    where
        F: FnOnce(&mut FileRecord),
    {
        let entry = self.entry(id).ok_or(TrackerError::NotFound(*id))?;
        let mut record = lock(&entry);

        if record.remaining_count == 0 {
            return Err(TrackerError::NoRowsRemaining(*id));
        }
        bump(&mut record);
        record.remaining_count -= 1;
        Ok(())
    }
}

fn lock(entry: &Mutex<FileRecord>) -> std::sync::MutexGuard<'_, FileRecord> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}
