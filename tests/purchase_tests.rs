mod common;

use common::{SESSION, balance, harness, register};
use tokenledger::error::LedgerError;

#[tokio::test]
async fn test_purchase_credits_once() {
    let h = harness();
    register(&h, "alice", "Alice").await;

    let order_id = h
        .engine
        .create_purchase_order("alice", SESSION, 250)
        .await
        .unwrap();
    let applied = h
        .engine
        .apply_purchase("alice", SESSION, &order_id)
        .await
        .unwrap();

    assert_eq!(applied.tokens, 250);
    assert_eq!(applied.balance, 250);
    assert_eq!(balance(&h, "alice"), 250);
}

#[tokio::test]
async fn test_duplicate_order_application_rejected() {
    let h = harness();
    register(&h, "alice", "Alice").await;

    let order_id = h
        .engine
        .create_purchase_order("alice", SESSION, 100)
        .await
        .unwrap();
    h.engine
        .apply_purchase("alice", SESSION, &order_id)
        .await
        .unwrap();

    let second = h.engine.apply_purchase("alice", SESSION, &order_id).await;
    assert!(matches!(second, Err(LedgerError::DuplicateOperation(_))));
    // Balance is unchanged after the rejected replay.
    assert_eq!(balance(&h, "alice"), 100);
}

#[tokio::test]
async fn test_order_for_other_session_rejected_before_capture() {
    let h = harness();
    register(&h, "alice", "Alice").await;
    register(&h, "mallory", "Mallory").await;

    let order_id = h
        .engine
        .create_purchase_order("alice", SESSION, 100)
        .await
        .unwrap();

    let stolen = h.engine.apply_purchase("mallory", SESSION, &order_id).await;
    assert!(matches!(stolen, Err(LedgerError::PermissionDenied(_))));
    assert_eq!(balance(&h, "mallory"), 0);

    let wrong_session = h.engine.apply_purchase("alice", "other", &order_id).await;
    assert!(matches!(wrong_session, Err(LedgerError::PermissionDenied(_))));
}

#[tokio::test]
async fn test_failed_capture_leaves_ledger_untouched() {
    let h = harness();
    register(&h, "alice", "Alice").await;

    let order_id = h
        .engine
        .create_purchase_order("alice", SESSION, 100)
        .await
        .unwrap();
    h.gateway.set_capture_status("DECLINED");

    let result = h.engine.apply_purchase("alice", SESSION, &order_id).await;
    assert!(matches!(result, Err(LedgerError::FailedPrecondition(_))));
    assert_eq!(balance(&h, "alice"), 0);

    // The order was never settled, so a later successful capture applies.
    h.gateway.set_capture_status("COMPLETED");
    h.engine
        .apply_purchase("alice", SESSION, &order_id)
        .await
        .unwrap();
    assert_eq!(balance(&h, "alice"), 100);
}

#[tokio::test]
async fn test_purchase_requires_catalog_package() {
    let h = harness();
    register(&h, "alice", "Alice").await;

    let result = h.engine.create_purchase_order("alice", SESSION, 123).await;
    assert!(matches!(result, Err(LedgerError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_tip_recorded_once_without_balance_change() {
    let h = harness();
    register(&h, "alice", "Alice").await;

    let order_id = h
        .engine
        .create_tip_order("alice", SESSION, "5.00")
        .await
        .unwrap();
    h.engine.apply_tip("alice", SESSION, &order_id).await.unwrap();
    assert_eq!(balance(&h, "alice"), 0);

    let second = h.engine.apply_tip("alice", SESSION, &order_id).await;
    assert!(matches!(second, Err(LedgerError::DuplicateOperation(_))));
}

#[tokio::test]
async fn test_tip_amount_bounds() {
    let h = harness();
    register(&h, "alice", "Alice").await;

    assert!(matches!(
        h.engine.create_tip_order("alice", SESSION, "0.50").await,
        Err(LedgerError::InvalidArgument(_))
    ));
    assert!(matches!(
        h.engine.create_tip_order("alice", SESSION, "500.01").await,
        Err(LedgerError::InvalidArgument(_))
    ));
    assert!(matches!(
        h.engine.create_tip_order("alice", SESSION, "1.005").await,
        Err(LedgerError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_unknown_user_cannot_order() {
    let h = harness();
    let result = h.engine.create_purchase_order("ghost", SESSION, 100).await;
    assert!(matches!(result, Err(LedgerError::NotFound(_))));
}
