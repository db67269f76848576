//! Row shape and validation.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use thiserror::Error;

/// Number of fields in a data row: first name, last name, email.
pub const FIELD_COUNT: usize = 3;

const FIELD_NAMES: [&str; FIELD_COUNT] = ["first_name", "last_name", "email"];

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// One decoded record, exactly as read from the source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawRow(Vec<String>);

impl RawRow {
    pub fn new(fields: Vec<String>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for RawRow {
    fn from(fields: Vec<String>) -> Self {
        Self(fields)
    }
}

impl<const N: usize> From<[&str; N]> for RawRow {
    fn from(fields: [&str; N]) -> Self {
        Self(fields.iter().map(|f| f.to_string()).collect())
    }
}

impl From<csv_async::StringRecord> for RawRow {
    fn from(record: csv_async::StringRecord) -> Self {
        Self(record.iter().map(str::to_string).collect())
    }
}

/// A row that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRow {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Why a row did not produce an account.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RowRejection {
    #[error("Expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Account already exists: {0}")]
    DuplicateEmail(String),
}

impl RowRejection {
    /// Metric label for this rejection.
    pub fn label(&self) -> &'static str {
        match self {
            RowRejection::DuplicateEmail(_) => "duplicate",
            _ => "invalid",
        }
    }
}

/// Failure to decode a record from the underlying source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RowReadError {
    /// The record could not be decoded; later records are still readable.
    #[error("Malformed record: {0}")]
    Decode(String),

    /// The source itself failed; nothing after this point can be read.
    #[error("I/O error while reading rows: {0}")]
    Io(String),
}

impl From<csv_async::Error> for RowReadError {
    fn from(err: csv_async::Error) -> Self {
        match err.kind() {
            csv_async::ErrorKind::Io(_) => RowReadError::Io(err.to_string()),
            _ => RowReadError::Decode(err.to_string()),
        }
    }
}

/// Checks field count, required fields and email shape.
pub fn validate(row: &RawRow) -> Result<ValidRow, RowRejection> {
    let fields = row.fields();
    if fields.len() != FIELD_COUNT {
        return Err(RowRejection::FieldCount {
            expected: FIELD_COUNT,
            found: fields.len(),
        });
    }

    for (value, name) in fields.iter().zip(FIELD_NAMES) {
        if value.trim().is_empty() {
            return Err(RowRejection::MissingField(name));
        }
    }

    let email = &fields[2];
    if !EMAIL_REGEX.is_match(email) {
        return Err(RowRejection::InvalidEmail(email.clone()));
    }

    Ok(ValidRow {
        first_name: fields[0].clone(),
        last_name: fields[1].clone(),
        email: email.clone(),
    })
}
