//! Account store - handle to account state
//!
//! Each account sits behind its own async mutex, so operations on distinct
//! accounts never contend. The only way to change a balance is
//! `with_locked_account`.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, EncryptedCardRef};

type AccountCell = Arc<Mutex<Account>>;

/// In-memory account store with per-account locks
pub struct AccountStore {
    accounts: RwLock<HashMap<String, AccountCell>>,
    lock_timeout: Duration,
}

impl AccountStore {
    /// Create an empty store
    ///
    /// `lock_timeout` bounds how long an operation waits for an account lock
    /// before giving up with `Error::Unavailable`.
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            lock_timeout,
        }
    }

    /// Create a new account with a zero balance
    pub fn create(&self, handle: &str, encrypted_card_ref: EncryptedCardRef) -> Result<Account> {
        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        if accounts.contains_key(handle) {
            return Err(Error::DuplicateAccount(handle.to_string()));
        }

        let account = Account::new(handle, encrypted_card_ref);
        accounts.insert(handle.to_string(), Arc::new(Mutex::new(account.clone())));
        Ok(account)
    }

    /// Current state of an account
    pub async fn get(&self, handle: &str) -> Result<Account> {
        let cell = self.cell(handle)?;
        let account = self.acquire(handle, &cell).await?;
        Ok(account.clone())
    }

    /// Whether an account exists
    pub fn contains(&self, handle: &str) -> bool {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(handle)
    }

    /// Number of accounts
    pub fn len(&self) -> usize {
        self.accounts.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All handles, sorted
    pub fn handles(&self) -> Vec<String> {
        let mut handles: Vec<String> = self
            .accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        handles.sort();
        handles
    }

    /// Point-in-time copy of every account, sorted by handle
    ///
    /// Each account is read under its own lock, so the copy is consistent per
    /// account but not across accounts.
    pub async fn accounts(&self) -> Result<Vec<Account>> {
        let mut cells: Vec<(String, AccountCell)> = self
            .accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(handle, cell)| (handle.clone(), Arc::clone(cell)))
            .collect();
        cells.sort_by(|a, b| a.0.cmp(&b.0));

        let mut out = Vec::with_capacity(cells.len());
        for (handle, cell) in cells {
            out.push(self.acquire(&handle, &cell).await?.clone());
        }
        Ok(out)
    }

    /// Run a balance update under the account's exclusive lock
    ///
    /// `update` sees the current account and returns the new balance, or an
    /// error to abort without any write. On success the balance is committed
    /// and `on_commit` runs with the updated account while the lock is still
    /// held. The lock is released on every exit path.
    ///
    /// Dropping the returned future before the lock is acquired has no
    /// effect. Once acquired, the critical section contains no await point
    /// and always runs to completion.
    pub async fn with_locked_account<F, C, T>(
        &self,
        handle: &str,
        update: F,
        on_commit: C,
    ) -> Result<T>
    where
        F: FnOnce(&Account) -> Result<Decimal>,
        C: FnOnce(&Account) -> T,
    {
        let cell = self.cell(handle)?;
        let mut account = self.acquire(handle, &cell).await?;

        let new_balance = update(&*account)?;
        if new_balance < Decimal::ZERO {
            return Err(Error::integrity(format!(
                "Refusing to commit negative balance {} for {}",
                new_balance, handle
            )));
        }

        account.balance = new_balance;
        account.updated_at = Utc::now();
        debug!(handle, %new_balance, "Committed balance");

        Ok(on_commit(&*account))
    }

    /// Run a read-only closure under the account's exclusive lock
    pub async fn inspect<F, T>(&self, handle: &str, f: F) -> Result<T>
    where
        F: FnOnce(&Account) -> T,
    {
        let cell = self.cell(handle)?;
        let account = self.acquire(handle, &cell).await?;
        Ok(f(&*account))
    }

    /// Run a closure while every account lock is held
    ///
    /// Locks are taken in handle order. Only this method holds more than one
    /// account lock at a time, so it cannot deadlock with single-account
    /// updates. Used to take consistent snapshots.
    pub async fn frozen<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&[Account]) -> T,
    {
        let mut cells: Vec<(String, AccountCell)> = self
            .accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(handle, cell)| (handle.clone(), Arc::clone(cell)))
            .collect();
        cells.sort_by(|a, b| a.0.cmp(&b.0));

        let mut guards = Vec::with_capacity(cells.len());
        for (handle, cell) in &cells {
            guards.push(self.acquire(handle, cell).await?);
        }

        let accounts: Vec<Account> = guards.iter().map(|guard| (**guard).clone()).collect();
        Ok(f(&accounts))
    }

    /// Load restored accounts into an empty store
    ///
    /// All or nothing: the store stays empty unless every account goes in.
    pub(crate) fn restore(&self, restored: Vec<Account>) -> Result<()> {
        let mut loaded: HashMap<String, AccountCell> = HashMap::with_capacity(restored.len());
        for account in restored {
            if loaded.contains_key(&account.handle) {
                return Err(Error::integrity(format!(
                    "Snapshot contains duplicate account {}",
                    account.handle
                )));
            }
            loaded.insert(account.handle.clone(), Arc::new(Mutex::new(account)));
        }

        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        if !accounts.is_empty() {
            return Err(Error::integrity("Cannot restore into a non-empty account store"));
        }
        *accounts = loaded;
        Ok(())
    }

    fn cell(&self, handle: &str) -> Result<AccountCell> {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(handle)
            .cloned()
            .ok_or_else(|| Error::not_found(handle))
    }

    async fn acquire<'a>(
        &self,
        handle: &str,
        cell: &'a AccountCell,
    ) -> Result<MutexGuard<'a, Account>> {
        tokio::time::timeout(self.lock_timeout, cell.lock())
            .await
            .map_err(|_| {
                Error::unavailable(format!(
                    "Timed out after {:?} waiting for account {}",
                    self.lock_timeout, handle
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> AccountStore {
        AccountStore::new(Duration::from_secs(1))
    }

    fn card_ref() -> EncryptedCardRef {
        EncryptedCardRef::new("opaque")
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = store();
        store.create("alice", card_ref()).unwrap();

        let account = store.get("alice").await.unwrap();
        assert_eq!(account.handle, "alice");
        assert_eq!(account.balance, Decimal::ZERO);
        assert!(store.contains("alice"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_and_missing() {
        let store = store();
        store.create("alice", card_ref()).unwrap();

        assert!(matches!(
            store.create("alice", card_ref()),
            Err(Error::DuplicateAccount(_))
        ));
        assert!(matches!(store.get("bob").await, Err(Error::AccountNotFound(_))));
    }

    #[tokio::test]
    async fn test_locked_update_commits_and_runs_hook() {
        let store = store();
        store.create("alice", card_ref()).unwrap();

        let seen = store
            .with_locked_account(
                "alice",
                |account| Ok(account.balance + Decimal::from(5)),
                |account| account.balance,
            )
            .await
            .unwrap();

        assert_eq!(seen, Decimal::from(5));
        assert_eq!(store.get("alice").await.unwrap().balance, Decimal::from(5));
    }

    #[tokio::test]
    async fn test_failed_update_writes_nothing_and_releases_lock() {
        let store = store();
        store.create("alice", card_ref()).unwrap();

        let result: Result<()> = store
            .with_locked_account(
                "alice",
                |_| Err(Error::InvalidAmount(Decimal::ZERO)),
                |_| panic!("hook must not run on abort"),
            )
            .await;
        assert!(matches!(result, Err(Error::InvalidAmount(_))));

        // Lock was released: a second update goes through
        store
            .with_locked_account("alice", |_| Ok(Decimal::ONE), |_| ())
            .await
            .unwrap();
        assert_eq!(store.get("alice").await.unwrap().balance, Decimal::ONE);
    }

    #[tokio::test]
    async fn test_negative_balance_is_never_committed() {
        let store = store();
        store.create("alice", card_ref()).unwrap();

        let result = store
            .with_locked_account("alice", |_| Ok(Decimal::NEGATIVE_ONE), |_| ())
            .await;
        assert!(matches!(result, Err(Error::Integrity(_))));
        assert_eq!(store.get("alice").await.unwrap().balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_restore_requires_empty_store() {
        let store = store();
        let restored = vec![Account::new("alice", card_ref()), Account::new("bob", card_ref())];
        store.restore(restored).unwrap();
        assert_eq!(store.handles(), vec!["alice".to_string(), "bob".to_string()]);

        let again = store.restore(vec![Account::new("carol", card_ref())]);
        assert!(matches!(again, Err(Error::Integrity(_))));
    }

    #[tokio::test]
    async fn test_restore_with_duplicate_handle_loads_nothing() {
        let store = store();
        let restored = vec![Account::new("alice", card_ref()), Account::new("alice", card_ref())];
        assert!(matches!(store.restore(restored), Err(Error::Integrity(_))));
        assert!(store.is_empty());
        assert!(matches!(store.get("alice").await, Err(Error::AccountNotFound(_))));
    }
}
