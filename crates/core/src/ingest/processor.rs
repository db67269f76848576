//! Record processor: turns one row into an account, or a counted failure.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::account::{Account, AccountId, AccountRegistry};
use crate::file::{FileId, FileTracker};
use crate::metrics::ROWS_PROCESSED;

use super::row::{validate, RawRow, RowRejection};

/// What happened to a processed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Created(AccountId),
    Rejected(RowRejection),
}

impl RowOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, RowOutcome::Created(_))
    }

    fn label(&self) -> &'static str {
        match self {
            RowOutcome::Created(_) => "created",
            RowOutcome::Rejected(rejection) => rejection.label(),
        }
    }
}

/// Validates rows, claims emails in the registry and accounts every row
/// against its file exactly once.
///
/// Never retries and never touches any file other than the one it is given.
#[derive(Debug, Clone)]
pub struct RecordProcessor {
    registry: Arc<AccountRegistry>,
    tracker: Arc<FileTracker>,
}

impl RecordProcessor {
    pub fn new(registry: Arc<AccountRegistry>, tracker: Arc<FileTracker>) -> Self {
        Self { registry, tracker }
    }

    /// Processes one row on behalf of `file_id`.
    pub fn process(&self, row: &RawRow, file_id: &FileId) -> RowOutcome {
        let outcome = self.evaluate(row);

        let accounted = match &outcome {
            RowOutcome::Created(_) => self.tracker.record_success(file_id),
            RowOutcome::Rejected(_) => self.tracker.record_failure(file_id),
        };
        if let Err(e) = accounted {
            warn!(file_id = %file_id, "Row outcome not recorded: {}", e);
        }

        ROWS_PROCESSED.with_label_values(&[outcome.label()]).inc();
        outcome
    }

    fn evaluate(&self, row: &RawRow) -> RowOutcome {
        let valid = match validate(row) {
            Ok(valid) => valid,
            Err(rejection) => {
                debug!("Invalid line {:?}: {}", row.fields(), rejection);
                return RowOutcome::Rejected(rejection);
            }
        };

        let account = Account::new(valid.first_name, valid.last_name, valid.email);
        let account_id = account.id;
        let email = account.email.clone();

        if self.registry.try_insert(account) {
            debug!("Account created: {}", email);
            RowOutcome::Created(account_id)
        } else {
            debug!("Account already exists: {}", email);
            RowOutcome::Rejected(RowRejection::DuplicateEmail(email))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::FileStatus;
    use uuid::Uuid;

    fn setup(total_rows: u64) -> (RecordProcessor, Arc<AccountRegistry>, Arc<FileTracker>, FileId) {
        let registry = Arc::new(AccountRegistry::new());
        let tracker = Arc::new(FileTracker::new());
        let file_id = Uuid::new_v4();
        tracker.create(file_id, "test.csv", total_rows);
        let processor = RecordProcessor::new(Arc::clone(&registry), Arc::clone(&tracker));
        (processor, registry, tracker, file_id)
    }

    #[test]
    fn test_valid_row_creates_account() {
        let (processor, registry, tracker, file_id) = setup(1);

        let outcome = processor.process(&RawRow::from(["Ann", "Lee", "ann@x.com"]), &file_id);

        let RowOutcome::Created(account_id) = outcome else {
            panic!("expected account creation, got {:?}", outcome);
        };
        assert_eq!(registry.get("ann@x.com").unwrap().id, account_id);

        let record = tracker.get(&file_id).unwrap();
        assert_eq!(record.success_count, 1);
        assert_eq!(record.fail_count, 0);
        assert_eq!(record.remaining_count, 0);
    }

    #[test]
    fn test_invalid_row_counts_failure() {
        let (processor, registry, tracker, file_id) = setup(1);

        let outcome = processor.process(&RawRow::from(["Ann", "Lee", "not-an-email"]), &file_id);

        assert!(matches!(
            outcome,
            RowOutcome::Rejected(RowRejection::InvalidEmail(_))
        ));
        assert!(registry.is_empty());
        let record = tracker.get(&file_id).unwrap();
        assert_eq!(record.fail_count, 1);
        assert_eq!(record.remaining_count, 0);
    }

    #[test]
    fn test_duplicate_counts_failure() {
        let (processor, registry, tracker, file_id) = setup(2);

        assert!(processor
            .process(&RawRow::from(["Ann", "Lee", "ann@x.com"]), &file_id)
            .is_created());
        let outcome = processor.process(&RawRow::from(["Cy", "Xu", "ann@x.com"]), &file_id);

        assert_eq!(
            outcome,
            RowOutcome::Rejected(RowRejection::DuplicateEmail("ann@x.com".to_string()))
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("ann@x.com").unwrap().first_name, "Ann");

        let record = tracker.get(&file_id).unwrap();
        assert_eq!(record.success_count, 1);
        assert_eq!(record.fail_count, 1);
        assert_eq!(record.remaining_count, 0);
    }

    #[test]
    fn test_only_target_file_touched() {
        let (processor, _registry, tracker, file_id) = setup(1);
        let other = Uuid::new_v4();
        tracker.create(other, "other.csv", 1);

        processor.process(&RawRow::from(["Ann", "Lee", "ann@x.com"]), &file_id);

        let untouched = tracker.get(&other).unwrap();
        assert_eq!(untouched.processed(), 0);
        assert_eq!(untouched.remaining_count, 1);
        assert_eq!(untouched.status, FileStatus::Loading);
    }

    #[test]
    fn test_unknown_file_still_registers_account() {
        let (processor, registry, _tracker, _file_id) = setup(0);

        let outcome = processor.process(&RawRow::from(["Ann", "Lee", "ann@x.com"]), &Uuid::new_v4());

        assert!(outcome.is_created());
        assert!(registry.contains("ann@x.com"));
    }
}
