//! Card service - reader/writer access and tap-to-pay
//!
//! Device calls can block for as long as the hardware takes, so they run on
//! the blocking pool and always finish before any account lock is taken.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::domain::result::{Error, Result};
use crate::ports::CardDevice;
use crate::services::ledger::{LedgerReceipt, LedgerService};

pub struct CardService {
    device: Option<Arc<dyn CardDevice>>,
    ledger: Arc<LedgerService>,
}

impl CardService {
    pub fn new(device: Option<Arc<dyn CardDevice>>, ledger: Arc<LedgerService>) -> Self {
        Self { device, ledger }
    }

    /// Name of the attached device, if any
    pub fn device_name(&self) -> Option<&str> {
        self.device.as_deref().map(|d| d.name())
    }

    /// Read the presented card's payload
    pub async fn read_card(&self) -> Result<Option<String>> {
        let device = self.device()?;
        run_blocking(move || device.read_card()).await
    }

    /// Write a payload to the presented card
    pub async fn write_card(&self, payload: &str) -> Result<bool> {
        let device = self.device()?;
        let payload = payload.to_string();
        let written = run_blocking(move || device.write_card(&payload)).await?;
        debug!(written, "Card write finished");
        Ok(written)
    }

    /// Handle of the account bound to the presented card
    pub async fn identify(&self) -> Result<String> {
        let card_id = self
            .read_card()
            .await?
            .ok_or_else(|| Error::unavailable("No card presented"))?;
        self.ledger
            .find_by_card(&card_id)
            .await?
            .ok_or_else(|| Error::not_found("no account is bound to the presented card"))
    }

    /// Pay from the account bound to the presented card
    pub async fn tap_to_pay(&self, amount: Decimal) -> Result<LedgerReceipt> {
        let handle = self.identify().await?;
        let receipt = self.ledger.pay(&handle, amount).await?;
        info!(handle = %handle, %amount, "Tap-to-pay accepted");
        Ok(receipt)
    }

    fn device(&self) -> Result<Arc<dyn CardDevice>> {
        self.device
            .clone()
            .ok_or_else(|| Error::unavailable("No card device configured"))
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::unavailable(format!("Card device task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::adapters::MemoryCardDevice;
    use crate::domain::Keyring;
    use crate::services::{
        AccountStore, CardIdentityBinder, NotificationBroadcaster, TransactionLog,
    };

    fn ledger() -> Arc<LedgerService> {
        Arc::new(LedgerService::new(
            Arc::new(CardIdentityBinder::new(&Keyring::generate().card_key)),
            AccountStore::new(Duration::from_secs(1)),
            TransactionLog::new(),
            NotificationBroadcaster::default(),
        ))
    }

    #[tokio::test]
    async fn test_no_device_is_unavailable() {
        let cards = CardService::new(None, ledger());
        assert!(cards.device_name().is_none());
        assert!(matches!(cards.read_card().await, Err(Error::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_tap_to_pay_debits_bound_account() {
        let ledger = ledger();
        ledger.register("alice", "CARD-001").await.unwrap();
        ledger.reload("alice", Decimal::from(10)).await.unwrap();

        let device = Arc::new(MemoryCardDevice::new());
        let cards = CardService::new(Some(device.clone() as Arc<dyn CardDevice>), Arc::clone(&ledger));

        assert!(matches!(
            cards.tap_to_pay(Decimal::ONE).await,
            Err(Error::Unavailable(_))
        ));

        device.place_card("CARD-404");
        assert!(matches!(
            cards.tap_to_pay(Decimal::ONE).await,
            Err(Error::AccountNotFound(_))
        ));

        device.place_card("CARD-001");
        let receipt = cards.tap_to_pay(Decimal::from(4)).await.unwrap();
        assert_eq!(receipt.handle, "alice");
        assert_eq!(receipt.new_balance, Decimal::from(6));
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let device = Arc::new(MemoryCardDevice::new());
        device.place_card("");
        let cards = CardService::new(Some(device as Arc<dyn CardDevice>), ledger());

        assert_eq!(cards.device_name(), Some("memory"));
        assert_eq!(cards.read_card().await.unwrap(), None);
        assert!(cards.write_card("CARD-007").await.unwrap());
        assert_eq!(cards.read_card().await.unwrap().as_deref(), Some("CARD-007"));
    }
}
