//! Ingestion coordinator.
//!
//! Reads a row stream sequentially, hands each data row to the shared
//! dispatcher and finalizes the file once every submitted row has drained.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::account::AccountRegistry;
use crate::config::IngestConfig;
use crate::file::{FileId, FileRecord, FileStatus, FileTracker, TrackerError};
use crate::metrics::{FILES_FINISHED, INGEST_DURATION, ROWS_PROCESSED};

use super::dispatcher::{Batch, Dispatcher};
use super::processor::RecordProcessor;
use super::row::RowReadError;
use super::source::{count_data_rows, open_rows, RowStream};
use super::types::PoolStatus;

/// Error type for ingestion calls.
///
/// Only failures to open or count the source surface here; every per-row
/// problem is absorbed into the file's counters.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },
}

/// The ingestion service.
///
/// Owns the account registry, the file tracker and the row worker pool.
/// Clones share all of them, so one instance is built at start-up and handed
/// to every caller.
#[derive(Clone)]
pub struct Ingestor {
    config: IngestConfig,
    registry: Arc<AccountRegistry>,
    tracker: Arc<FileTracker>,
    processor: RecordProcessor,
    dispatcher: Dispatcher,
    shutdown: CancellationToken,
}

impl Ingestor {
    /// Creates an ingestor with empty stores.
    pub fn new(config: IngestConfig) -> Self {
        Self::with_stores(
            config,
            Arc::new(AccountRegistry::new()),
            Arc::new(FileTracker::new()),
        )
    }

    /// Creates an ingestor over existing stores.
    pub fn with_stores(
        config: IngestConfig,
        registry: Arc<AccountRegistry>,
        tracker: Arc<FileTracker>,
    ) -> Self {
        let dispatcher = Dispatcher::new(config.max_workers);
        let processor = RecordProcessor::new(Arc::clone(&registry), Arc::clone(&tracker));
        Self {
            config,
            registry,
            tracker,
            processor,
            dispatcher,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<AccountRegistry> {
        &self.registry
    }

    pub fn tracker(&self) -> &Arc<FileTracker> {
        &self.tracker
    }

    pub fn pool_status(&self) -> PoolStatus {
        self.dispatcher.status()
    }

    pub fn get_file(&self, id: &FileId) -> Option<FileRecord> {
        self.tracker.get(id)
    }

    pub fn list_files(&self) -> HashMap<FileId, FileRecord> {
        self.tracker.list()
    }

    /// Cancels every run in progress and refuses new rows.
    pub fn shutdown(&self) {
        info!("Shutting down ingestion");
        self.shutdown.cancel();
        self.dispatcher.close();
    }

    /// Registers a new file and returns its id. No rows are read.
    pub fn begin(&self, name: &str, total_rows: u64) -> FileId {
        let id = Uuid::new_v4();
        self.tracker.create(id, name, total_rows);
        id
    }

    /// Ingests `rows` (header first) and returns once they have drained.
    pub async fn ingest(&self, name: &str, total_rows: u64, rows: RowStream) -> FileId {
        self.ingest_with_token(name, total_rows, rows, self.shutdown.child_token())
            .await
    }

    /// Like [`ingest`](Self::ingest), stopping early when `token` is cancelled.
    pub async fn ingest_with_token(
        &self,
        name: &str,
        total_rows: u64,
        rows: RowStream,
        token: CancellationToken,
    ) -> FileId {
        let file_id = self.begin(name, total_rows);
        self.run(file_id, rows, token).await;
        file_id
    }

    /// Counts and ingests a CSV file, returning after the drain.
    ///
    /// Nothing is registered when the file cannot be opened or counted.
    pub async fn ingest_path(&self, path: &Path, name: &str) -> Result<FileId, IngestError> {
        let total_rows = count_data_rows(path).await?;
        let rows = open_rows(path).await?;
        Ok(self.ingest(name, total_rows, rows).await)
    }

    /// Counts a CSV file, registers it and ingests it in the background.
    pub async fn spawn_ingest_path(&self, path: &Path, name: &str) -> Result<FileId, IngestError> {
        let total_rows = count_data_rows(path).await?;
        let rows = open_rows(path).await?;
        let file_id = self.begin(name, total_rows);

        let ingestor = self.clone();
        let token = self.shutdown.child_token();
        tokio::spawn(async move {
            ingestor.run(file_id, rows, token).await;
        });

        Ok(file_id)
    }

    /// Drives one registered file to its final status.
    async fn run(&self, file_id: FileId, rows: RowStream, token: CancellationToken) -> FileStatus {
        let start = Instant::now();

        let tracker = Arc::clone(&self.tracker);
        let mut batch = self.dispatcher.batch(move || {
            ROWS_PROCESSED.with_label_values(&["panicked"]).inc();
            if let Err(e) = tracker.record_failure(&file_id) {
                warn!(file_id = %file_id, "Panicked row not recorded: {}", e);
            }
        });

        let completed = match self.config.max_duration() {
            Some(limit) => {
                tokio::time::timeout(limit, self.pump(file_id, rows, &mut batch, &token))
                    .await
                    .is_ok()
            }
            None => {
                self.pump(file_id, rows, &mut batch, &token).await;
                true
            }
        };

        let status = if completed {
            self.settle(&file_id, &token)
        } else {
            warn!(file_id = %file_id, "Ingestion timed out, aborting outstanding rows");
            batch.abort();
            let report = batch.drain().await;
            debug!(file_id = %file_id, aborted = report.aborted, "Batch drained after timeout");
            self.terminate(&file_id, FileStatus::TimedOut)
        };

        let elapsed = start.elapsed().as_secs_f64();
        FILES_FINISHED.with_label_values(&[status.as_str()]).inc();
        INGEST_DURATION
            .with_label_values(&[status.as_str()])
            .observe(elapsed);

        if let Some(record) = self.tracker.get(&file_id) {
            info!(
                file_id = %file_id,
                name = %record.name,
                %status,
                success = record.success_count,
                failed = record.fail_count,
                remaining = record.remaining_count,
                "Ingestion finished in {:.3}s",
                elapsed
            );
        }

        status
    }

    /// Reads the stream and submits rows until it ends or `token` fires,
    /// then drains the batch.
    async fn pump(
        &self,
        file_id: FileId,
        mut rows: RowStream,
        batch: &mut Batch,
        token: &CancellationToken,
    ) {
        // The first row is the header, whatever it contains.
        let _header = rows.next().await;

        loop {
            let item = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    warn!(file_id = %file_id, "Ingestion cancelled");
                    break;
                }
                item = rows.next() => item,
            };
            let Some(item) = item else { break };

            match item {
                Ok(row) => {
                    let processor = self.processor.clone();
                    let task_token = token.clone();
                    let submitted = tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            warn!(file_id = %file_id, "Ingestion cancelled while waiting for a worker");
                            break;
                        }
                        result = batch.submit(move || {
                            if task_token.is_cancelled() {
                                return;
                            }
                            processor.process(&row, &file_id);
                        }) => result,
                    };
                    if let Err(e) = submitted {
                        warn!(file_id = %file_id, "Row not submitted: {}", e);
                        break;
                    }
                }
                Err(RowReadError::Decode(message)) => {
                    warn!(file_id = %file_id, "Unreadable row: {}", message);
                    self.count_unreadable(&file_id);
                }
                Err(RowReadError::Io(message)) => {
                    error!(file_id = %file_id, "Row source failed: {}", message);
                    self.count_unreadable(&file_id);
                    break;
                }
            }
        }

        let report = batch.drain().await;
        debug!(file_id = %file_id, finished = report.finished, "Batch drained");
    }

    fn count_unreadable(&self, file_id: &FileId) {
        ROWS_PROCESSED.with_label_values(&["unreadable"]).inc();
        if let Err(e) = self.tracker.record_failure(file_id) {
            warn!(file_id = %file_id, "Unreadable row not recorded: {}", e);
        }
    }

    /// Finalizes a drained file, falling back to `Cancelled` when rows were
    /// skipped because of cancellation.
    fn settle(&self, file_id: &FileId, token: &CancellationToken) -> FileStatus {
        match self.tracker.finalize(file_id) {
            Ok(status) => status,
            Err(TrackerError::RowsOutstanding { .. }) if token.is_cancelled() => {
                self.terminate(file_id, FileStatus::Cancelled)
            }
            Err(e) => {
                warn!(file_id = %file_id, "File left unfinished: {}", e);
                self.current_status(file_id)
            }
        }
    }

    fn terminate(&self, file_id: &FileId, status: FileStatus) -> FileStatus {
        match self.tracker.terminate(file_id, status) {
            Ok(status) => status,
            Err(e) => {
                warn!(file_id = %file_id, "Could not mark file {}: {}", status, e);
                self.current_status(file_id)
            }
        }
    }

    fn current_status(&self, file_id: &FileId) -> FileStatus {
        self.tracker
            .get(file_id)
            .map(|record| record.status)
            .unwrap_or(FileStatus::Loading)
    }
}
