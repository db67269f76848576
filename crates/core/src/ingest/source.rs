//! CSV row source.
//!
//! Fields are decoded as plain strings with no header handling and no
//! field-count enforcement; the coordinator skips the header and the
//! processor judges the shape of each row.

use std::path::Path;

use csv_async::{AsyncReaderBuilder, StringRecord};
use futures::stream::{BoxStream, StreamExt};

use super::coordinator::IngestError;
use super::row::{RawRow, RowReadError};

/// Stream of rows as read from a source, header included.
pub type RowStream = BoxStream<'static, Result<RawRow, RowReadError>>;

fn reader_builder() -> AsyncReaderBuilder {
    let mut builder = AsyncReaderBuilder::new();
    builder.has_headers(false).flexible(true);
    builder
}

/// Opens a CSV file as a row stream.
pub async fn open_rows(path: &Path) -> Result<RowStream, IngestError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|source| IngestError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    let records = reader_builder().create_reader(file).into_records();
    Ok(records
        .map(|record| record.map(RawRow::from).map_err(RowReadError::from))
        .boxed())
}

/// Counts the data rows of a CSV file (every record but the header).
///
/// Uses the same reader settings as [`open_rows`], so the count matches
/// what the coordinator will see.
pub async fn count_data_rows(path: &Path) -> Result<u64, IngestError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|source| IngestError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    let mut reader = reader_builder().create_reader(file);
    let mut record = StringRecord::new();
    let mut records: u64 = 0;

    loop {
        match reader.read_record(&mut record).await {
            Ok(true) => records += 1,
            Ok(false) => break,
            // A malformed record still occupies a row.
            Err(e) => match RowReadError::from(e) {
                RowReadError::Decode(_) => records += 1,
                RowReadError::Io(message) => {
                    return Err(IngestError::Read {
                        path: path.to_path_buf(),
                        message,
                    })
                }
            },
        }
    }

    Ok(records.saturating_sub(1))
}

/// Wraps in-memory rows as a row stream.
pub fn rows_from_iter<I>(rows: I) -> RowStream
where
    I: IntoIterator<Item = RawRow>,
    I::IntoIter: Send + 'static,
{
    futures::stream::iter(rows.into_iter().map(Ok)).boxed()
}
