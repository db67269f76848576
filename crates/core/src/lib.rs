pub mod account;
pub mod config;
pub mod file;
pub mod ingest;
pub mod metrics;
pub mod sample;

pub use account::{Account, AccountId, AccountRegistry};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, IngestConfig,
    SanitizedConfig,
};
pub use file::{FileId, FileRecord, FileStatus, FileTracker, TrackerError};
pub use ingest::{
    count_data_rows, open_rows, Dispatcher, IngestError, Ingestor, PoolStatus, RawRow,
    RecordProcessor, RowOutcome, RowRejection, RowStream,
};
pub use sample::{generate_sample_csv, SampleError};
