mod common;

use common::{FlakySplitStore, Harness};
use rust_decimal_macros::dec;
use split_ledger::application::ledger::{CreateSplitRequest, SplitLedger};
use split_ledger::domain::ports::{SplitStore, UserDirectory};
use split_ledger::domain::shares::InviteeRequest;
use split_ledger::domain::split::{PaymentStatus, SplitType};
use split_ledger::domain::user::User;
use split_ledger::error::LedgerError;
use split_ledger::infrastructure::in_memory::{InMemoryNotifier, InMemoryUserDirectory};
use std::sync::Arc;

fn exact(title: &str, email: &str, amount: rust_decimal::Decimal) -> CreateSplitRequest {
    CreateSplitRequest {
        title: title.to_string(),
        total_amount: dec!(100),
        split_type: SplitType::Exact,
        participants: vec![InviteeRequest::with_amount(email, amount)],
    }
}

#[tokio::test]
async fn test_registration_converts_pending_rows() {
    let h = Harness::new();
    let bob = h.user("Bob", "bob@x.com").await;
    let first = h.ledger.create_split(&bob, exact("Lunch", "alice@x.com", dec!(50))).await.unwrap();
    let second = h.ledger.create_split(&bob, exact("Taxi", "ALICE@x.com", dec!(20))).await.unwrap();

    let (alice, outcome) = h.ledger.register_user("Alice", "alice@x.com").await.unwrap();
    assert_eq!(outcome.processed(), 2);
    assert!(outcome.partial_failure().is_none());

    for (split_id, share) in [(first.split_id, dec!(50)), (second.split_id, dec!(20))] {
        let record = h.store.get(split_id).await.unwrap().unwrap();
        let participant = record.participant_for(alice.id).unwrap();
        assert_eq!(participant.share.value(), share);
        assert_eq!(participant.payment_status, PaymentStatus::Pending);
        assert!(record.pending().iter().all(|p| p.notified));
    }

    let again = h.ledger.reconcile_pending_for_user(&alice).await.unwrap();
    assert_eq!(again.processed(), 0);
    assert_eq!(h.ledger.pending_count_for_user(&alice).await.unwrap(), 0);
    assert_eq!(h.ledger.list_for_user(&alice).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_concurrent_reconciliation_creates_one_row() {
    let h = Arc::new(Harness::new());
    let bob = h.user("Bob", "bob@x.com").await;
    let created = h.ledger.create_split(&bob, exact("Lunch", "alice@x.com", dec!(50))).await.unwrap();

    let alice = User::new("Alice", "alice@x.com").unwrap();
    h.users.store(alice.clone()).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let h = Arc::clone(&h);
        let alice = alice.clone();
        handles.push(tokio::spawn(async move {
            h.ledger.reconcile_pending_for_user(&alice).await.unwrap()
        }));
    }
    let mut converted = 0;
    for handle in handles {
        converted += handle.await.unwrap().processed();
    }
    assert_eq!(converted, 1);

    let record = h.store.get(created.split_id).await.unwrap().unwrap();
    let rows = record
        .participants()
        .iter()
        .filter(|p| p.user_id == alice.id)
        .count();
    assert_eq!(rows, 1);
    assert_eq!(h.notifier.sent_to(alice.id).await.len(), 1);
}

#[tokio::test]
async fn test_partial_failure_keeps_other_rows() {
    let store = FlakySplitStore::default();
    let ledger = SplitLedger::new(
        Box::new(store.clone()),
        Box::new(InMemoryUserDirectory::new()),
        Box::new(InMemoryNotifier::new()),
    );
    let (bob, _) = ledger.register_user("Bob", "bob@x.com").await.unwrap();
    let broken = ledger.create_split(&bob, exact("Lunch", "alice@x.com", dec!(50))).await.unwrap();
    let healthy = ledger.create_split(&bob, exact("Taxi", "alice@x.com", dec!(20))).await.unwrap();
    store.reject_writes_to(broken.split_id);

    let (alice, outcome) = ledger.register_user("Alice", "alice@x.com").await.unwrap();
    assert_eq!(outcome.processed(), 1);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].split_id, broken.split_id);
    assert!(matches!(
        outcome.partial_failure(),
        Some(LedgerError::ReconciliationPartialFailure { failed: 1, total: 2 })
    ));

    let healthy_record = store.get(healthy.split_id).await.unwrap().unwrap();
    assert!(healthy_record.participant_for(alice.id).is_some());
    let broken_record = store.get(broken.split_id).await.unwrap().unwrap();
    assert!(broken_record.participant_for(alice.id).is_none());
    assert_eq!(ledger.pending_count_for_user(&alice).await.unwrap(), 1);
}

#[tokio::test]
async fn test_reconcile_existing_participant_closes_row() {
    let h = Harness::new();
    let bob = h.user("Bob", "bob@x.com").await;
    let created = h.ledger.create_split(&bob, exact("Lunch", "alice@x.com", dec!(50))).await.unwrap();
    let alice = h.user("Alice", "alice@x.com").await;

    // A second pending row for the same email on an already-joined split.
    let mut record = h.store.get(created.split_id).await.unwrap().unwrap();
    record
        .add_pending("alice@x.com", split_ledger::domain::money::Share::new(dec!(5)).unwrap(), chrono::Utc::now())
        .unwrap();
    h.store.store(record).await.unwrap();

    let outcome = h.ledger.reconcile_pending_for_user(&alice).await.unwrap();
    assert_eq!(outcome.processed(), 1);
    assert!(outcome.converted[0].notice.is_none());

    let record = h.store.get(created.split_id).await.unwrap().unwrap();
    assert_eq!(record.participants().len(), 2);
    assert_eq!(record.open_pending().count(), 0);
}
