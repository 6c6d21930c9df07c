//! Core domain entities
//!
//! All ledger entities are defined here. These are pure data structures
//! with validation logic - no I/O or locking.

mod account;
mod card;
mod encryption;
mod event;
mod snapshot;
pub mod transaction;
pub mod result;

pub use account::Account;
pub use card::EncryptedCardRef;
pub use encryption::{Keyring, KeyringFile, KEY_LEN};
pub use event::BalanceChangeEvent;
pub use snapshot::{LedgerSnapshot, SNAPSHOT_VERSION};
pub use transaction::{NewTransaction, TransactionKind, TransactionRecord};
