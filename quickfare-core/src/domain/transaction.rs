//! Transaction record domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::card::EncryptedCardRef;

/// Direction of a ledger operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Credit: balance top-up
    Reload,
    /// Debit: fare or purchase
    Payment,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Reload => "reload",
            TransactionKind::Payment => "payment",
        }
    }

    /// Signed ledger amount for an (always positive) requested amount
    pub fn signed(&self, amount: Decimal) -> Decimal {
        match self {
            TransactionKind::Reload => amount,
            TransactionKind::Payment => -amount,
        }
    }
}

/// A committed, immutable entry of the transaction log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    /// Encrypted reference of the owning account (never the plaintext handle)
    pub account_ref: EncryptedCardRef,
    /// Signed amount: positive for credit, negative for debit
    pub amount: Decimal,
    pub kind: TransactionKind,
    /// Wall clock at commit, never earlier than the previous record
    pub timestamp: DateTime<Utc>,
    /// Process-wide, strictly increasing
    pub sequence_number: u64,
}

/// A transaction waiting for its sequence number and timestamp
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub account_ref: EncryptedCardRef,
    pub kind: TransactionKind,
    /// Positive requested amount
    pub amount: Decimal,
}

impl NewTransaction {
    pub fn new(account_ref: EncryptedCardRef, kind: TransactionKind, amount: Decimal) -> Self {
        Self {
            account_ref,
            kind,
            amount,
        }
    }

    /// Finalize into a record
    pub fn into_record(self, sequence_number: u64, timestamp: DateTime<Utc>) -> TransactionRecord {
        TransactionRecord {
            id: Uuid::new_v4(),
            account_ref: self.account_ref,
            amount: self.kind.signed(self.amount),
            kind: self.kind,
            timestamp,
            sequence_number,
        }
    }
}

/// Sum of signed amounts, the balance implied by a history
pub fn fold_amounts<'a>(records: impl IntoIterator<Item = &'a TransactionRecord>) -> Decimal {
    records
        .into_iter()
        .fold(Decimal::ZERO, |acc, record| acc + record.amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_is_recorded_negative() {
        let tx = NewTransaction::new(
            EncryptedCardRef::new("ref"),
            TransactionKind::Payment,
            Decimal::new(2000, 2),
        );
        let record = tx.into_record(7, Utc::now());
        assert_eq!(record.amount, Decimal::new(-2000, 2));
        assert_eq!(record.sequence_number, 7);
        assert_eq!(record.kind.as_str(), "payment");
    }

    #[test]
    fn test_fold_amounts() {
        let now = Utc::now();
        let records = vec![
            NewTransaction::new(EncryptedCardRef::new("a"), TransactionKind::Reload, Decimal::from(50))
                .into_record(1, now),
            NewTransaction::new(EncryptedCardRef::new("a"), TransactionKind::Payment, Decimal::from(20))
                .into_record(2, now),
        ];
        assert_eq!(fold_amounts(&records), Decimal::from(30));
    }
}
