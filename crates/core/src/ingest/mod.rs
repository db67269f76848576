//! Ingestion engine.
//!
//! The [`Ingestor`] reads a row stream, fans data rows out to a bounded
//! [`Dispatcher`] and finalizes the file once everything drained:
//! - `source`: CSV decoding into [`RawRow`]s
//! - `dispatcher`: semaphore-gated worker pool shared by all runs
//! - `processor`: per-row validation, dedup and accounting
//!
//! # Example
//!
//! ```ignore
//! use accounts_core::config::IngestConfig;
//! use accounts_core::ingest::Ingestor;
//!
//! let ingestor = Ingestor::new(IngestConfig::default());
//! let file_id = ingestor.ingest_path(path, "accounts.csv").await?;
//!
//! let file = ingestor.get_file(&file_id).unwrap();
//! println!("{} created, {} failed", file.success_count, file.fail_count);
//! ```

mod coordinator;
mod dispatcher;
mod processor;
mod row;
mod source;
mod types;

pub use coordinator::{IngestError, Ingestor};
pub use dispatcher::{Batch, DispatchError, Dispatcher};
pub use processor::{RecordProcessor, RowOutcome};
pub use row::{validate, RawRow, RowReadError, RowRejection, ValidRow, FIELD_COUNT};
pub use source::{count_data_rows, open_rows, rows_from_iter, RowStream};
pub use types::{DrainReport, PoolStatus};
