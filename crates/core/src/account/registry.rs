use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::types::Account;

/// Process-wide email → account mapping.
///
/// The only mutation is [`AccountRegistry::try_insert`], which performs the
/// lookup and the insert inside one write-lock critical section, so two rows
/// racing on the same email can never both be admitted.
#[derive(Debug, Default)]
pub struct AccountRegistry {
    accounts: RwLock<HashMap<String, Account>>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `account` under its email.
    ///
    /// Returns `false`, leaving the registry untouched, when an account with
    /// that email already exists.
    pub fn try_insert(&self, account: Account) -> bool {
        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        match accounts.entry(account.email.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(account);
                true
            }
        }
    }

    /// Looks up the account registered for `email`.
    pub fn get(&self, email: &str) -> Option<Account> {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(email)
            .cloned()
    }

    pub fn contains(&self, email: &str) -> bool {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(email)
    }

    /// Number of registered accounts.
    pub fn len(&self) -> usize {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered emails, sorted.
    pub fn emails(&self) -> Vec<String> {
        let mut emails: Vec<String> = self
            .accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        emails.sort();
        emails
    }
}
