//! Types for the ingest module.

use serde::{Deserialize, Serialize};

/// Status of the row worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatus {
    /// Pool name.
    pub name: String,
    /// Number of rows being processed right now.
    pub active_jobs: usize,
    /// Maximum concurrent rows.
    pub max_concurrent: usize,
    /// Submissions waiting for a free slot.
    pub queued_jobs: usize,
    /// Highest `active_jobs` observed since startup.
    pub peak_active: usize,
    /// Total rows processed since startup.
    pub total_processed: u64,
    /// Total row tasks that panicked since startup.
    pub total_failed: u64,
}

/// Summary of a drained batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    /// Tasks that ran to completion (including ones whose panic was caught).
    pub finished: u64,
    /// Tasks aborted before they could run.
    pub aborted: u64,
}
