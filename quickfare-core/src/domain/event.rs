//! Balance change event

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::transaction::TransactionRecord;

/// Notification that an account balance changed
///
/// Exists only in transit through the broadcaster. `sequence_number` is the
/// one of the triggering record, so a subscriber can spot gaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChangeEvent {
    pub account_handle: String,
    pub new_balance: Decimal,
    /// Signed amount of the triggering record
    pub amount: Decimal,
    pub sequence_number: u64,
}

impl BalanceChangeEvent {
    pub fn from_record(
        account_handle: impl Into<String>,
        new_balance: Decimal,
        record: &TransactionRecord,
    ) -> Self {
        Self {
            account_handle: account_handle.into(),
            new_balance,
            amount: record.amount,
            sequence_number: record.sequence_number,
        }
    }
}
