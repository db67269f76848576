//! Per-file ingestion progress tracking.

mod tracker;
mod types;

pub use tracker::{FileTracker, TrackerError};
pub use types::{FileId, FileRecord, FileStatus};
