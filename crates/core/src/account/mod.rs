//! Account registry: at most one account per email for the process lifetime.

mod registry;
mod types;

pub use registry::AccountRegistry;
pub use types::{Account, AccountId};
