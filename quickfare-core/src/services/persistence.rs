//! Persistence service - saves and restores the ledger through a snapshot store

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::domain::result::Result;
use crate::ports::SnapshotStore;
use crate::services::ledger::LedgerService;

pub struct PersistenceService {
    store: Option<Arc<dyn SnapshotStore>>,
    ledger: Arc<LedgerService>,
}

impl PersistenceService {
    pub fn new(store: Option<Arc<dyn SnapshotStore>>, ledger: Arc<LedgerService>) -> Self {
        Self { store, ledger }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Write a consistent snapshot of the ledger
    ///
    /// Returns `None` when persistence is disabled.
    pub async fn save(&self) -> Result<Option<SaveResult>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };

        let snapshot = self.ledger.snapshot().await?;
        store.save(&snapshot).await?;

        let result = SaveResult {
            accounts: snapshot.accounts.len(),
            transactions: snapshot.transactions.len(),
            last_sequence: snapshot.last_sequence(),
            saved_at: snapshot.saved_at,
        };
        info!(
            accounts = result.accounts,
            transactions = result.transactions,
            "Saved ledger"
        );
        Ok(Some(result))
    }

    /// Load the stored snapshot into the (empty) ledger
    ///
    /// Returns whether a snapshot was found and accepted.
    pub async fn restore(&self) -> Result<bool> {
        let Some(store) = &self.store else {
            return Ok(false);
        };

        match store.load().await? {
            Some(snapshot) => {
                self.ledger.restore(snapshot).await?;
                Ok(true)
            }
            None => {
                info!("No saved ledger, starting empty");
                Ok(false)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveResult {
    pub accounts: usize,
    pub transactions: usize,
    pub last_sequence: u64,
    pub saved_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::{Keyring, LedgerSnapshot};
    use crate::services::{
        AccountStore, CardIdentityBinder, NotificationBroadcaster, TransactionLog,
    };

    #[derive(Default)]
    struct MemoryStore {
        saved: Mutex<Option<LedgerSnapshot>>,
    }

    #[async_trait]
    impl SnapshotStore for MemoryStore {
        async fn load(&self) -> Result<Option<LedgerSnapshot>> {
            Ok(self.saved.lock().unwrap().clone())
        }

        async fn save(&self, snapshot: &LedgerSnapshot) -> Result<()> {
            *self.saved.lock().unwrap() = Some(snapshot.clone());
            Ok(())
        }
    }

    fn ledger(binder: &Arc<CardIdentityBinder>) -> Arc<LedgerService> {
        Arc::new(LedgerService::new(
            Arc::clone(binder),
            AccountStore::new(Duration::from_secs(1)),
            TransactionLog::new(),
            NotificationBroadcaster::default(),
        ))
    }

    #[tokio::test]
    async fn test_disabled_is_a_no_op() {
        let binder = Arc::new(CardIdentityBinder::new(&Keyring::generate().card_key));
        let service = PersistenceService::new(None, ledger(&binder));
        assert!(!service.is_enabled());
        assert!(service.save().await.unwrap().is_none());
        assert!(!service.restore().await.unwrap());
    }

    #[tokio::test]
    async fn test_save_and_restore_through_store() {
        let binder = Arc::new(CardIdentityBinder::new(&Keyring::generate().card_key));
        let store: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::default());

        let first = ledger(&binder);
        first.register("alice", "CARD-001").await.unwrap();
        first.reload("alice", Decimal::from(12)).await.unwrap();
        let saved = PersistenceService::new(Some(Arc::clone(&store)), first)
            .save()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saved.transactions, 1);

        let second = ledger(&binder);
        let service = PersistenceService::new(Some(store), Arc::clone(&second));
        assert!(service.restore().await.unwrap());
        assert_eq!(second.balance("alice").await.unwrap(), Decimal::from(12));
    }
}
