//! Account types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique account identifier.
pub type AccountId = Uuid;

/// An account created from a valid, non-duplicate row.
///
/// Accounts are immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub first_name: String,
    pub last_name: String,
    /// Identity key, compared case-sensitively as provided.
    pub email: String,
}

impl Account {
    /// Creates an account with a freshly generated id.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_generates_distinct_ids() {
        let a = Account::new("Ann", "Lee", "ann@x.com");
        let b = Account::new("Ann", "Lee", "ann@x.com");
        assert_ne!(a.id, b.id);
        assert_eq!(a.email, "ann@x.com");
    }

    #[test]
    fn test_account_serialization() {
        let account = Account::new("Bob", "Wu", "bob@x.com");
        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["first_name"], "Bob");
        assert_eq!(json["email"], "bob@x.com");
        assert!(json["id"].is_string());
    }
}
