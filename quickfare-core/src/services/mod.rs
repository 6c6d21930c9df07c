//! Service layer - business logic orchestration
//!
//! The ledger engine and its building blocks (binder, store, log,
//! broadcaster) plus the services that drive the collaborator ports.

mod auth;
mod binder;
mod broadcaster;
mod card;
pub mod encryption;
mod ledger;
mod persistence;
mod store;
mod transaction_log;

pub use auth::AuthService;
pub use binder::CardIdentityBinder;
pub use broadcaster::{BalanceSubscription, NotificationBroadcaster, DEFAULT_CAPACITY};
pub use card::CardService;
pub use encryption::{EncryptionService, EncryptionStatus};
pub use ledger::{LedgerReceipt, LedgerService, LedgerSummary};
pub use persistence::{PersistenceService, SaveResult};
pub use store::AccountStore;
pub use transaction_log::TransactionLog;
