//! Persistence tests
//!
//! Open a ledger over a temp data directory, save it, reopen it and check
//! that balances, history and the sequence counter survive.

use rust_decimal::Decimal;
use tempfile::TempDir;

use quickfare_core::config::{Config, KeyPolicy};
use quickfare_core::domain::LedgerSnapshot;
use quickfare_core::{Error, QuickfareContext};

fn dec(value: i64) -> Decimal {
    Decimal::from(value)
}

#[tokio::test]
async fn test_reopen_restores_ledger() {
    let dir = TempDir::new().unwrap();

    {
        let ctx = QuickfareContext::open(dir.path()).await.unwrap();
        assert!(ctx.persistence_service.is_enabled());
        ctx.ledger_service.register("alice", "CARD-001").await.unwrap();
        ctx.ledger_service.reload("alice", dec(50)).await.unwrap();
        ctx.ledger_service.pay("alice", dec(20)).await.unwrap();
        ctx.ledger_service.register("bob", "CARD-002").await.unwrap();

        let saved = ctx.persist().await.unwrap().unwrap();
        assert_eq!(saved.accounts, 2);
        assert_eq!(saved.transactions, 2);
        assert_eq!(saved.last_sequence, 2);
    }

    assert!(dir.path().join("ledger.json").exists());
    assert!(dir.path().join("keyring.json").exists());

    let ctx = QuickfareContext::open(dir.path()).await.unwrap();
    let ledger = &ctx.ledger_service;
    assert_eq!(ledger.balance("alice").await.unwrap(), dec(30));
    assert_eq!(ledger.balance("bob").await.unwrap(), Decimal::ZERO);

    let history = ledger.history("alice").await.unwrap();
    let amounts: Vec<Decimal> = history.iter().map(|r| r.amount).collect();
    assert_eq!(amounts, vec![dec(50), dec(-20)]);

    // Counter resumes after the restored records
    let receipt = ledger.reload("bob", dec(1)).await.unwrap();
    assert_eq!(receipt.record.sequence_number, 3);

    // Card bindings survive: the same card is still taken
    assert!(matches!(
        ledger.register("carol", "CARD-001").await,
        Err(Error::DuplicateCard)
    ));
    assert_eq!(ledger.find_by_card("CARD-002").await.unwrap(), Some("bob".to_string()));
}

#[tokio::test]
async fn test_tampered_snapshot_is_refused() {
    let dir = TempDir::new().unwrap();
    {
        let ctx = QuickfareContext::open(dir.path()).await.unwrap();
        ctx.ledger_service.register("alice", "CARD-001").await.unwrap();
        ctx.ledger_service.reload("alice", dec(10)).await.unwrap();
        ctx.persist().await.unwrap();
    }

    let path = dir.path().join("ledger.json");
    let mut snapshot: LedgerSnapshot =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    snapshot.accounts[0].balance = dec(1_000);
    std::fs::write(&path, serde_json::to_string(&snapshot).unwrap()).unwrap();

    let result = QuickfareContext::open(dir.path()).await;
    assert!(matches!(result, Err(Error::Integrity(_))));
}

#[tokio::test]
async fn test_snapshot_with_foreign_key_fails_decryption() {
    let dir = TempDir::new().unwrap();
    {
        let ctx = QuickfareContext::open(dir.path()).await.unwrap();
        ctx.ledger_service.register("alice", "CARD-001").await.unwrap();
        ctx.persist().await.unwrap();
    }

    // Replacing the keyring orphans every stored card reference
    std::fs::remove_file(dir.path().join("keyring.json")).unwrap();
    let result = QuickfareContext::open(dir.path()).await;
    assert!(matches!(result, Err(Error::Decryption(_))));
}

#[tokio::test]
async fn test_persistence_off_writes_no_ledger() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::load(dir.path()).unwrap();
    config.persist = false;
    config.key_policy = KeyPolicy::File;
    config.save(dir.path()).unwrap();

    let ctx = QuickfareContext::open(dir.path()).await.unwrap();
    ctx.ledger_service.register("alice", "CARD-001").await.unwrap();
    assert!(ctx.persist().await.unwrap().is_none());
    assert!(!dir.path().join("ledger.json").exists());
}

#[tokio::test]
async fn test_in_memory_context_rejects_persistence_with_ephemeral_keys() {
    let config = Config {
        persist: true,
        key_policy: KeyPolicy::Ephemeral,
        ..Config::default()
    };
    assert!(matches!(
        QuickfareContext::in_memory(config),
        Err(Error::Config(_))
    ));
}
