//! Ledger service - reload/payment engine
//!
//! Every balance change follows the same path: lock the account, validate,
//! commit the new balance, append the record (still under the lock, so the
//! per-account record order is the lock order), release, then publish. The
//! publish step runs outside the lock so a slow subscriber never stretches
//! the critical section.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::result::{Error, Result};
use crate::domain::transaction::fold_amounts;
use crate::domain::{
    Account, BalanceChangeEvent, LedgerSnapshot, NewTransaction, TransactionKind,
    TransactionRecord, SNAPSHOT_VERSION,
};
use crate::services::binder::CardIdentityBinder;
use crate::services::broadcaster::{BalanceSubscription, NotificationBroadcaster};
use crate::services::store::AccountStore;
use crate::services::transaction_log::TransactionLog;

/// Ledger service owning the account store, log and broadcaster
pub struct LedgerService {
    binder: Arc<CardIdentityBinder>,
    store: AccountStore,
    log: TransactionLog,
    broadcaster: NotificationBroadcaster,
    /// Serializes registrations so the card uniqueness check cannot race
    registration: Mutex<()>,
}

impl LedgerService {
    pub fn new(
        binder: Arc<CardIdentityBinder>,
        store: AccountStore,
        log: TransactionLog,
        broadcaster: NotificationBroadcaster,
    ) -> Self {
        Self {
            binder,
            store,
            log,
            broadcaster,
            registration: Mutex::new(()),
        }
    }

    /// Register a new account bound to a physical card
    ///
    /// The card identifier is stored encrypted only. A card already bound
    /// to another account is rejected (compared by decrypted identifier).
    pub async fn register(&self, handle: &str, card_id: &str) -> Result<Account> {
        Account::validate_handle(handle).map_err(Error::validation)?;
        Account::validate_card_id(card_id).map_err(Error::validation)?;

        let _registration = self.registration.lock().await;

        if self.store.contains(handle) {
            return Err(Error::DuplicateAccount(handle.to_string()));
        }
        if self.find_by_card(card_id).await?.is_some() {
            return Err(Error::DuplicateCard);
        }

        let encrypted = self.binder.bind(card_id)?;
        let account = self.store.create(handle, encrypted)?;
        info!(handle, "Registered account");
        Ok(account)
    }

    /// Credit an account
    pub async fn reload(&self, handle: &str, amount: Decimal) -> Result<LedgerReceipt> {
        self.apply(handle, TransactionKind::Reload, amount).await
    }

    /// Debit an account; fails without effect if the balance is too low
    pub async fn pay(&self, handle: &str, amount: Decimal) -> Result<LedgerReceipt> {
        self.apply(handle, TransactionKind::Payment, amount).await
    }

    /// Current balance
    pub async fn balance(&self, handle: &str) -> Result<Decimal> {
        Ok(self.store.get(handle).await?.balance)
    }

    /// Current account state
    pub async fn account(&self, handle: &str) -> Result<Account> {
        self.store.get(handle).await
    }

    /// Every account, sorted by handle
    pub async fn accounts(&self) -> Result<Vec<Account>> {
        self.store.accounts().await
    }

    /// Transaction history of an account, by sequence number
    pub async fn history(&self, handle: &str) -> Result<Vec<TransactionRecord>> {
        let account = self.store.get(handle).await?;
        let card_id = self.binder.unbind(&account.encrypted_card_ref)?;
        self.log.history(&self.binder, &card_id)
    }

    /// Live balance events of one account
    ///
    /// Events are published after the account lock is released, so two
    /// operations racing on the same account may arrive out of order.
    /// Ordering by `sequence_number` restores commit order; the event with
    /// the highest number carries the current balance.
    pub fn watch_balance(&self, handle: &str) -> Result<BalanceSubscription> {
        if !self.store.contains(handle) {
            return Err(Error::not_found(handle));
        }
        Ok(self.broadcaster.subscribe_to(handle))
    }

    /// Live balance events of every account
    pub fn watch_all(&self) -> BalanceSubscription {
        self.broadcaster.subscribe()
    }

    /// Handle of the account bound to a plaintext card identifier
    pub async fn find_by_card(&self, card_id: &str) -> Result<Option<String>> {
        for account in self.store.accounts().await? {
            if self.binder.matches(&account.encrypted_card_ref, card_id)? {
                return Ok(Some(account.handle));
            }
        }
        Ok(None)
    }

    /// Check that an account's history folds to its balance
    pub async fn verify(&self, handle: &str) -> Result<()> {
        // Records are appended under the account lock, so reading both under
        // it gives a consistent pair
        let (balance, folded) = self
            .store
            .inspect(handle, |account| -> Result<(Decimal, Decimal)> {
                let card_id = self.binder.unbind(&account.encrypted_card_ref)?;
                let history = self.log.history(&self.binder, &card_id)?;
                Ok((account.balance, fold_amounts(&history)))
            })
            .await??;

        if balance != folded {
            warn!(handle, %balance, %folded, "History does not fold to balance");
            return Err(Error::integrity(format!(
                "History of {} sums to {} but balance is {}",
                handle, folded, balance
            )));
        }
        Ok(())
    }

    /// Consistent copy of the whole ledger
    pub async fn snapshot(&self) -> Result<LedgerSnapshot> {
        self.store
            .frozen(|accounts| LedgerSnapshot::new(accounts.to_vec(), self.log.records()))
            .await
    }

    /// Load a snapshot into an empty ledger after re-verifying it
    ///
    /// Handles and cards must be unique, every record must belong to exactly
    /// one account with an amount signed by its kind, sequence numbers must
    /// strictly increase, each account's timestamps must not go backwards,
    /// its running balance must never dip below zero and its records must
    /// fold to its balance. The whole snapshot is checked before anything is
    /// written; a rejected snapshot leaves the ledger empty.
    pub async fn restore(&self, snapshot: LedgerSnapshot) -> Result<()> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(Error::integrity(format!(
                "Unsupported snapshot version {}",
                snapshot.version
            )));
        }

        // No registration can slip in between the checks and the writes
        let _registration = self.registration.lock().await;
        if !self.store.is_empty() || !self.log.is_empty() {
            return Err(Error::integrity("Cannot restore into a non-empty ledger"));
        }

        let mut handles: HashSet<&str> = HashSet::new();
        let mut owners: HashMap<String, &Account> = HashMap::new();
        for account in &snapshot.accounts {
            Account::validate_handle(&account.handle).map_err(Error::integrity)?;
            if !handles.insert(account.handle.as_str()) {
                return Err(Error::integrity(format!(
                    "Snapshot contains duplicate account {}",
                    account.handle
                )));
            }
            if account.balance < Decimal::ZERO {
                return Err(Error::integrity(format!(
                    "Account {} has negative balance {}",
                    account.handle, account.balance
                )));
            }
            let card_id = self.binder.unbind(&account.encrypted_card_ref)?;
            if owners.insert(card_id, account).is_some() {
                return Err(Error::integrity("Two accounts are bound to the same card"));
            }
        }

        let mut running: HashMap<&str, (Decimal, Option<DateTime<Utc>>)> = HashMap::new();
        let mut previous_sequence: Option<u64> = None;
        for record in &snapshot.transactions {
            if previous_sequence.is_some_and(|previous| record.sequence_number <= previous) {
                return Err(Error::integrity(format!(
                    "Sequence number {} is out of order",
                    record.sequence_number
                )));
            }
            previous_sequence = Some(record.sequence_number);

            let signed_by_kind = match record.kind {
                TransactionKind::Reload => record.amount > Decimal::ZERO,
                TransactionKind::Payment => record.amount < Decimal::ZERO,
            };
            if !signed_by_kind {
                return Err(Error::integrity(format!(
                    "Record {} is a {} of {}",
                    record.sequence_number,
                    record.kind.as_str(),
                    record.amount
                )));
            }

            let card_id = self.binder.unbind(&record.account_ref)?;
            let owner = owners.get(&card_id).ok_or_else(|| {
                Error::integrity(format!(
                    "Record {} does not belong to any account",
                    record.sequence_number
                ))
            })?;

            let (balance, last_timestamp) = running
                .entry(owner.handle.as_str())
                .or_insert((Decimal::ZERO, None));
            if last_timestamp.is_some_and(|last| record.timestamp < last) {
                return Err(Error::integrity(format!(
                    "Record {} of {} is older than the one before it",
                    record.sequence_number, owner.handle
                )));
            }
            *last_timestamp = Some(record.timestamp);
            *balance += record.amount;
            if *balance < Decimal::ZERO {
                return Err(Error::integrity(format!(
                    "History of {} goes negative at record {}",
                    owner.handle, record.sequence_number
                )));
            }
        }

        for account in &snapshot.accounts {
            let sum = running
                .get(account.handle.as_str())
                .map(|(balance, _)| *balance)
                .unwrap_or(Decimal::ZERO);
            if sum != account.balance {
                return Err(Error::integrity(format!(
                    "History of {} sums to {} but balance is {}",
                    account.handle, sum, account.balance
                )));
            }
        }

        let account_count = snapshot.accounts.len();
        let record_count = snapshot.transactions.len();
        // Log first: with no accounts in the store nothing can append meanwhile
        self.log.restore(snapshot.transactions)?;
        if let Err(e) = self.store.restore(snapshot.accounts) {
            self.log.clear();
            return Err(e);
        }
        info!(accounts = account_count, records = record_count, "Restored ledger snapshot");
        Ok(())
    }

    /// Counters for status output
    pub fn summary(&self) -> LedgerSummary {
        LedgerSummary {
            total_accounts: self.store.len(),
            total_transactions: self.log.len(),
            last_sequence: self.log.last_sequence(),
            subscribers: self.broadcaster.subscriber_count(),
        }
    }

    async fn apply(
        &self,
        handle: &str,
        kind: TransactionKind,
        amount: Decimal,
    ) -> Result<LedgerReceipt> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(amount));
        }

        let (new_balance, record) = self
            .store
            .with_locked_account(
                handle,
                |account| match kind {
                    TransactionKind::Reload => account
                        .balance
                        .checked_add(amount)
                        .ok_or_else(|| Error::validation("Reload would overflow the balance")),
                    TransactionKind::Payment => {
                        if account.balance < amount {
                            Err(Error::InsufficientBalance {
                                available: account.balance,
                                requested: amount,
                            })
                        } else {
                            Ok(account.balance - amount)
                        }
                    }
                },
                |account| {
                    let record = self.log.append(NewTransaction::new(
                        account.encrypted_card_ref.clone(),
                        kind,
                        amount,
                    ));
                    (account.balance, record)
                },
            )
            .await?;

        debug!(
            handle,
            kind = kind.as_str(),
            %amount,
            %new_balance,
            sequence_number = record.sequence_number,
            "Applied ledger operation"
        );
        self.broadcaster
            .publish(BalanceChangeEvent::from_record(handle, new_balance, &record));

        Ok(LedgerReceipt {
            handle: handle.to_string(),
            new_balance,
            record,
        })
    }
}

/// Outcome of a committed reload or payment
#[derive(Debug, Clone, Serialize)]
pub struct LedgerReceipt {
    pub handle: String,
    pub new_balance: Decimal,
    pub record: TransactionRecord,
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerSummary {
    pub total_accounts: usize,
    pub total_transactions: usize,
    pub last_sequence: u64,
    pub subscribers: usize,
}
