//! Integration tests for quickfare-core
//!
//! End-to-end ledger scenarios through the public context API.

use std::sync::Arc;

use rust_decimal::Decimal;
use tempfile::TempDir;

use quickfare_core::adapters::MemoryCardDevice;
use quickfare_core::config::Config;
use quickfare_core::ports::CardDevice;
use quickfare_core::{Error, QuickfareContext, TransactionKind};

fn context() -> QuickfareContext {
    QuickfareContext::in_memory(Config::default()).unwrap()
}

fn dec(value: i64) -> Decimal {
    Decimal::from(value)
}

#[tokio::test]
async fn test_alice_reload_then_pay() {
    let ctx = context();
    let ledger = &ctx.ledger_service;

    let account = ledger.register("alice", "CARD-001").await.unwrap();
    assert_eq!(account.balance, Decimal::ZERO);

    assert_eq!(ledger.reload("alice", dec(50)).await.unwrap().new_balance, dec(50));
    assert_eq!(ledger.pay("alice", dec(20)).await.unwrap().new_balance, dec(30));
    assert_eq!(ledger.balance("alice").await.unwrap(), dec(30));

    let history = ledger.history("alice").await.unwrap();
    let amounts: Vec<Decimal> = history.iter().map(|r| r.amount).collect();
    assert_eq!(amounts, vec![dec(50), dec(-20)]);
    assert_eq!(history[0].kind, TransactionKind::Reload);
    assert_eq!(history[1].kind, TransactionKind::Payment);
    assert!(history[0].sequence_number < history[1].sequence_number);
}

#[tokio::test]
async fn test_bob_cannot_pay_from_empty_account() {
    let ctx = context();
    let ledger = &ctx.ledger_service;
    ledger.register("bob", "CARD-002").await.unwrap();

    let err = ledger.pay("bob", dec(10)).await.unwrap_err();
    assert!(matches!(
        err,
        Error::InsufficientBalance { available, requested }
            if available == Decimal::ZERO && requested == dec(10)
    ));
    assert_eq!(ledger.balance("bob").await.unwrap(), Decimal::ZERO);
    assert!(ledger.history("bob").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_dave_watcher_sees_every_change_in_order() {
    let ctx = context();
    let ledger = &ctx.ledger_service;
    ledger.register("dave", "CARD-004").await.unwrap();
    ledger.register("erin", "CARD-005").await.unwrap();

    let mut watcher = ledger.watch_balance("dave").unwrap();

    let mut receipts = Vec::new();
    receipts.push(ledger.reload("dave", dec(30)).await.unwrap());
    ledger.reload("erin", dec(5)).await.unwrap();
    receipts.push(ledger.pay("dave", dec(12)).await.unwrap());
    assert!(ledger.pay("dave", dec(100)).await.is_err());
    receipts.push(ledger.reload("dave", dec(2)).await.unwrap());

    for receipt in &receipts {
        let event = watcher.next_event().await.unwrap();
        assert_eq!(event.account_handle, "dave");
        assert_eq!(event.new_balance, receipt.new_balance);
        assert_eq!(event.sequence_number, receipt.record.sequence_number);
        assert_eq!(event.amount, receipt.record.amount);
    }
    // The failed payment and erin's reload produced nothing for dave
    assert!(watcher.try_next_event().is_none());
    assert_eq!(watcher.missed(), 0);
}

#[tokio::test]
async fn test_dropped_watcher_does_not_block_ledger() {
    let ctx = QuickfareContext::in_memory(Config {
        broadcast_capacity: 2,
        ..Config::default()
    })
    .unwrap();
    let ledger = &ctx.ledger_service;
    ledger.register("dave", "CARD-004").await.unwrap();

    let slow = ledger.watch_balance("dave").unwrap();
    let dropped = ledger.watch_all();
    drop(dropped);

    // Far more events than the queue holds: publish must never wait
    for _ in 0..20 {
        ledger.reload("dave", Decimal::ONE).await.unwrap();
    }
    assert_eq!(ledger.balance("dave").await.unwrap(), dec(20));
    assert_eq!(ctx.ledger_service.summary().subscribers, 1);

    // The slow subscriber skips what it missed and resumes with the newest
    let mut slow = slow;
    let event = slow.next_event().await.unwrap();
    assert!(slow.missed() > 0);
    assert!(event.sequence_number > 2);
}

#[tokio::test]
async fn test_registration_rules() {
    let ctx = context();
    let ledger = &ctx.ledger_service;
    ledger.register("alice", "CARD-001").await.unwrap();

    assert!(matches!(
        ledger.register("alice", "CARD-777").await,
        Err(Error::DuplicateAccount(_))
    ));
    assert!(matches!(
        ledger.register("mallory", "CARD-001").await,
        Err(Error::DuplicateCard)
    ));
    assert!(matches!(ledger.balance("nobody").await, Err(Error::AccountNotFound(_))));

    // The card id never appears in the clear
    let account = ledger.account("alice").await.unwrap();
    assert!(!account.encrypted_card_ref.as_str().contains("CARD-001"));
    let snapshot = ledger.snapshot().await.unwrap();
    assert!(!serde_json::to_string(&snapshot).unwrap().contains("CARD-001"));
}

#[tokio::test]
async fn test_token_login_and_authenticated_payment() {
    let ctx = context();
    ctx.ledger_service.register("alice", "CARD-001").await.unwrap();
    ctx.ledger_service.reload("alice", dec(10)).await.unwrap();

    assert!(matches!(
        ctx.auth_service.login("ghost").await,
        Err(Error::AccountNotFound(_))
    ));

    let token = ctx.auth_service.login("alice").await.unwrap();
    let handle = ctx.auth_service.authenticate(&token.access_token).unwrap();
    let receipt = ctx.ledger_service.pay(&handle, dec(3)).await.unwrap();
    assert_eq!(receipt.new_balance, dec(7));

    // A token from another context is signed with another secret
    let other = context();
    assert!(matches!(
        other.auth_service.authenticate(&token.access_token),
        Err(Error::Authentication(_))
    ));
}

#[tokio::test]
async fn test_tap_to_pay_with_memory_device() {
    let device = Arc::new(MemoryCardDevice::new());
    let ctx = context().with_card_device(Arc::clone(&device) as Arc<dyn CardDevice>);
    ctx.ledger_service.register("alice", "CARD-001").await.unwrap();
    ctx.ledger_service.reload("alice", dec(5)).await.unwrap();

    assert!(matches!(
        ctx.card_service.tap_to_pay(dec(1)).await,
        Err(Error::Unavailable(_))
    ));

    device.place_card("CARD-999");
    assert!(matches!(
        ctx.card_service.tap_to_pay(dec(1)).await,
        Err(Error::AccountNotFound(_))
    ));

    device.place_card("CARD-001");
    assert!(matches!(
        ctx.card_service.tap_to_pay(dec(50)).await,
        Err(Error::InsufficientBalance { .. })
    ));
    let receipt = ctx.card_service.tap_to_pay(dec(2)).await.unwrap();
    assert_eq!(receipt.handle, "alice");
    assert_eq!(receipt.new_balance, dec(3));
}

#[tokio::test]
async fn test_file_card_device_from_config() {
    let dir = TempDir::new().unwrap();
    let card_path = dir.path().join("card.txt");
    let ctx = QuickfareContext::in_memory(Config {
        card_device_path: Some(card_path.clone()),
        ..Config::default()
    })
    .unwrap();

    assert_eq!(ctx.card_service.device_name(), Some("file"));
    assert_eq!(ctx.card_service.read_card().await.unwrap(), None);
    assert!(!ctx.card_service.write_card("CARD-010").await.unwrap());

    std::fs::write(&card_path, "").unwrap();
    assert!(ctx.card_service.write_card("CARD-010").await.unwrap());
    ctx.ledger_service.register("frank", "CARD-010").await.unwrap();
    assert_eq!(ctx.card_service.identify().await.unwrap(), "frank");
}
