//! Transaction log - append-only record history
//!
//! Records are kept in sequence-number order. History lookups decrypt every
//! stored reference and compare plaintext card identifiers, so their cost
//! grows with the size of the log. An index keyed by handle would remove
//! that, at the price of keeping handles next to the records.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};

use crate::domain::result::{Error, Result};
use crate::domain::{NewTransaction, TransactionRecord};
use crate::services::binder::CardIdentityBinder;

#[derive(Default)]
struct LogState {
    records: Vec<TransactionRecord>,
    last_timestamp: Option<DateTime<Utc>>,
}

/// Append-only, concurrency-safe transaction log
pub struct TransactionLog {
    state: RwLock<LogState>,
    /// Last assigned sequence number
    sequence: AtomicU64,
}

impl Default for TransactionLog {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionLog {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LogState::default()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Append a transaction, assigning its sequence number and timestamp
    ///
    /// Never fails. The timestamp is clamped so it never precedes the one of
    /// the previous record, even when the wall clock steps backwards.
    pub fn append(&self, entry: NewTransaction) -> TransactionRecord {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        let now = Utc::now();
        let timestamp = match state.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };
        let sequence_number = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;

        let record = entry.into_record(sequence_number, timestamp);
        state.last_timestamp = Some(timestamp);
        state.records.push(record.clone());
        record
    }

    /// Records whose reference decrypts to `card_id`, by sequence number
    pub fn history(&self, binder: &CardIdentityBinder, card_id: &str) -> Result<Vec<TransactionRecord>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);

        let mut matching = Vec::new();
        for record in &state.records {
            if binder.matches(&record.account_ref, card_id)? {
                matching.push(record.clone());
            }
        }
        Ok(matching)
    }

    /// Copy of every record, by sequence number
    pub fn records(&self) -> Vec<TransactionRecord> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .clone()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Last assigned sequence number (0 before the first append)
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Load restored records into an empty log
    ///
    /// Records must be strictly increasing by sequence number. The counter
    /// resumes after the highest restored number.
    pub(crate) fn restore(&self, records: Vec<TransactionRecord>) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if !state.records.is_empty() {
            return Err(Error::integrity("Cannot restore into a non-empty transaction log"));
        }

        for pair in records.windows(2) {
            if pair[1].sequence_number <= pair[0].sequence_number {
                return Err(Error::integrity(format!(
                    "Sequence number {} follows {}",
                    pair[1].sequence_number, pair[0].sequence_number
                )));
            }
        }

        let last_sequence = records.last().map(|r| r.sequence_number).unwrap_or(0);
        state.last_timestamp = records.iter().map(|r| r.timestamp).max();
        state.records = records;
        self.sequence.store(last_sequence, Ordering::SeqCst);
        Ok(())
    }

    /// Drop every record and reset the counter, undoing a restore
    pub(crate) fn clear(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = LogState::default();
        self.sequence.store(0, Ordering::SeqCst);
    }
}
