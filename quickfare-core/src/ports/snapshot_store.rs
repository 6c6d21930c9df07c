//! Snapshot store port - persistence hook

use async_trait::async_trait;

use crate::domain::result::Result;
use crate::domain::LedgerSnapshot;

/// Durable storage for ledger snapshots
///
/// The ledger itself is an in-memory authority; implementations of this
/// trait decide where its state goes between processes. A loaded snapshot is
/// always re-verified by the ledger before it is accepted.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the latest snapshot, `None` if nothing was saved yet
    async fn load(&self) -> Result<Option<LedgerSnapshot>>;

    /// Replace the stored snapshot
    async fn save(&self, snapshot: &LedgerSnapshot) -> Result<()>;
}
