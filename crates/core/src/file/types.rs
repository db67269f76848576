//! File (ingestion job) types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique file identifier, assigned when ingestion begins.
pub type FileId = Uuid;

/// Lifecycle status of an ingestion job.
///
/// `Loading` is the only non-terminal state. A fully drained file is
/// `Success` regardless of how many of its rows failed; the counters tell
/// the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Loading,
    Success,
    TimedOut,
    Cancelled,
}

impl FileStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FileStatus::Loading)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Loading => "loading",
            FileStatus::Success => "success",
            FileStatus::TimedOut => "timed_out",
            FileStatus::Cancelled => "cancelled",
        }
    }

    pub const ALL: [FileStatus; 4] = [
        FileStatus::Loading,
        FileStatus::Success,
        FileStatus::TimedOut,
        FileStatus::Cancelled,
    ];
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress and status of one ingestion job.
///
/// `success_count + fail_count + remaining_count == total_rows` holds for
/// every snapshot handed out by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub name: String,
    pub status: FileStatus,
    pub success_count: u64,
    pub fail_count: u64,
    pub remaining_count: u64,
    /// Data rows announced when ingestion began (header excluded).
    pub total_rows: u64,
    pub created_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    pub fn new(id: FileId, name: impl Into<String>, total_rows: u64) -> Self {
        Self {
            id,
            name: name.into(),
            status: FileStatus::Loading,
            success_count: 0,
            fail_count: 0,
            remaining_count: total_rows,
            total_rows,
            created_at: Utc::now(),
            end_at: None,
        }
    }

    /// Rows accounted for so far.
    pub fn processed(&self) -> u64 {
        self.success_count + self.fail_count
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record() {
        let record = FileRecord::new(Uuid::new_v4(), "accounts.csv", 3);
        assert_eq!(record.status, FileStatus::Loading);
        assert_eq!(record.remaining_count, 3);
        assert_eq!(record.processed(), 0);
        assert!(record.end_at.is_none());
        assert!(!record.is_finished());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&FileStatus::TimedOut).unwrap(),
            "\"timed_out\""
        );
        assert_eq!(FileStatus::Success.to_string(), "success");
        assert!(FileStatus::Cancelled.is_terminal());
        assert!(!FileStatus::Loading.is_terminal());
    }

    #[test]
    fn test_record_serialization() {
        let record = FileRecord::new(Uuid::new_v4(), "a.csv", 2);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "loading");
        assert_eq!(json["remaining_count"], 2);
        assert!(json["end_at"].is_null());
    }
}
