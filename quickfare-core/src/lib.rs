//! QuickFare Core - stored-value card ledger
//!
//! This crate implements the ledger following hexagonal architecture:
//!
//! - **domain**: Core entities (Account, TransactionRecord, events, snapshots)
//! - **ports**: Trait definitions for collaborators (Authenticator, CardDevice, SnapshotStore)
//! - **services**: Ledger engine and the services driving the ports
//! - **adapters**: Concrete implementations (HMAC tokens, card devices, JSON snapshots)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use adapters::{FileCardDevice, HmacTokenAuthenticator, JsonSnapshotStore};
use config::Config;
use domain::result::Result;
use ports::{CardDevice, SnapshotStore};
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, OperationResult};
pub use domain::{
    Account, BalanceChangeEvent, EncryptedCardRef, Keyring, LedgerSnapshot, TransactionKind,
    TransactionRecord,
};
pub use services::{BalanceSubscription, LedgerReceipt};

/// Main context for QuickFare operations
///
/// Built once at process start and shared by every request. It holds the
/// configuration, the key-derived components and all services; nothing in
/// the crate keeps state outside it.
pub struct QuickfareContext {
    pub config: Config,
    pub data_dir: Option<PathBuf>,
    pub ledger_service: Arc<LedgerService>,
    pub auth_service: AuthService,
    pub card_service: CardService,
    pub persistence_service: PersistenceService,
    pub encryption_service: Option<EncryptionService>,
}

impl QuickfareContext {
    /// Create an in-memory context with fresh key material
    ///
    /// Nothing is read from or written to disk except the card device file
    /// when `config.card_device_path` is set.
    pub fn in_memory(config: Config) -> Result<Self> {
        config.validate()?;
        let device = config
            .card_device_path
            .as_ref()
            .map(|path| Arc::new(FileCardDevice::new(path)) as Arc<dyn CardDevice>);
        Ok(Self::build(config, Keyring::generate(), None, device, None))
    }

    /// Open a context over a data directory
    ///
    /// Loads settings.json, obtains key material per the key policy and,
    /// when persistence is on, restores ledger.json (re-verified before it is
    /// accepted).
    pub async fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let config = Config::load(data_dir)?;

        let encryption_service = EncryptionService::new(data_dir.to_path_buf());
        let keyring = encryption_service.keyring_for(config.key_policy)?;

        let snapshot_store = config
            .persist
            .then(|| Arc::new(JsonSnapshotStore::in_dir(data_dir)) as Arc<dyn SnapshotStore>);
        let device = config
            .card_device_path
            .as_ref()
            .map(|path| Arc::new(FileCardDevice::new(path)) as Arc<dyn CardDevice>);

        let mut context = Self::build(config, keyring, snapshot_store, device, Some(encryption_service));
        context.data_dir = Some(data_dir.to_path_buf());

        let restored = context.persistence_service.restore().await?;
        info!(
            data_dir = %data_dir.display(),
            restored,
            accounts = context.ledger_service.summary().total_accounts,
            "Opened ledger"
        );
        Ok(context)
    }

    /// Replace the card device
    pub fn with_card_device(mut self, device: Arc<dyn CardDevice>) -> Self {
        self.card_service = CardService::new(Some(device), Arc::clone(&self.ledger_service));
        self
    }

    /// Save the ledger if persistence is enabled
    pub async fn persist(&self) -> Result<Option<SaveResult>> {
        self.persistence_service.save().await
    }

    fn build(
        config: Config,
        keyring: Keyring,
        snapshot_store: Option<Arc<dyn SnapshotStore>>,
        device: Option<Arc<dyn CardDevice>>,
        encryption_service: Option<EncryptionService>,
    ) -> Self {
        let binder = Arc::new(CardIdentityBinder::new(&keyring.card_key));
        let ledger_service = Arc::new(LedgerService::new(
            binder,
            AccountStore::new(config.lock_timeout),
            TransactionLog::new(),
            NotificationBroadcaster::new(config.broadcast_capacity),
        ));

        let tokens = Arc::new(HmacTokenAuthenticator::new(keyring.token_secret, config.token_ttl));
        let auth_service = AuthService::new(tokens, Arc::clone(&ledger_service));
        let card_service = CardService::new(device, Arc::clone(&ledger_service));
        let persistence_service = PersistenceService::new(snapshot_store, Arc::clone(&ledger_service));

        Self {
            config,
            data_dir: None,
            ledger_service,
            auth_service,
            card_service,
            persistence_service,
            encryption_service,
        }
    }
}
