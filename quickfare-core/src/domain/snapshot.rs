//! Ledger snapshot domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::account::Account;
use super::transaction::TransactionRecord;

/// Snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Durable unit of the ledger: every account plus the full transaction log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub accounts: Vec<Account>,
    /// Ordered by sequence number
    pub transactions: Vec<TransactionRecord>,
}

impl LedgerSnapshot {
    pub fn new(accounts: Vec<Account>, transactions: Vec<TransactionRecord>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            accounts,
            transactions,
        }
    }

    /// Highest sequence number in the snapshot (0 when empty)
    pub fn last_sequence(&self) -> u64 {
        self.transactions
            .iter()
            .map(|t| t.sequence_number)
            .max()
            .unwrap_or(0)
    }
}
