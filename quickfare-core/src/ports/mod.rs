//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external collaborators. The ledger core
//! depends only on these traits, not on concrete implementations.

mod authenticator;
mod card_device;
mod snapshot_store;

pub use authenticator::Authenticator;
pub use card_device::CardDevice;
pub use snapshot_store::SnapshotStore;
