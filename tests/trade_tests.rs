mod common;

use common::{balance, buy_tokens, harness, register};
use tokenledger::error::LedgerError;

#[tokio::test]
async fn test_trade_moves_tokens_atomically() {
    let h = harness();
    register(&h, "alice", "Alice").await;
    register(&h, "bob", "Bob").await;
    buy_tokens(&h, "alice", 500).await;

    let receipt = h.engine.trade_tokens("alice", "Bob", 120).await.unwrap();
    assert_eq!(receipt.sender_balance, 380);
    assert_eq!(balance(&h, "alice"), 380);
    assert_eq!(balance(&h, "bob"), 120);
}

#[tokio::test]
async fn test_trade_receiver_lookup_is_normalized() {
    let h = harness();
    register(&h, "alice", "Alice").await;
    register(&h, "bob", "Bob").await;
    buy_tokens(&h, "alice", 100).await;

    h.engine.trade_tokens("alice", "  bOb ", 10).await.unwrap();
    assert_eq!(balance(&h, "bob"), 10);
}

#[tokio::test]
async fn test_trade_insufficient_balance_has_no_side_effects() {
    let h = harness();
    register(&h, "alice", "Alice").await;
    register(&h, "bob", "Bob").await;
    buy_tokens(&h, "alice", 100).await;

    let result = h.engine.trade_tokens("alice", "Bob", 101).await;
    assert!(matches!(
        result,
        Err(LedgerError::InsufficientBalance { required: 101, available: 100 })
    ));
    assert_eq!(balance(&h, "alice"), 100);
    assert_eq!(balance(&h, "bob"), 0);
}

#[tokio::test]
async fn test_trade_with_missing_party_fails() {
    let h = harness();
    register(&h, "alice", "Alice").await;
    buy_tokens(&h, "alice", 100).await;

    assert!(matches!(
        h.engine.trade_tokens("alice", "nobody", 10).await,
        Err(LedgerError::NotFound(_))
    ));
    assert!(matches!(
        h.engine.trade_tokens("ghost", "Alice", 10).await,
        Err(LedgerError::NotFound(_))
    ));
    assert_eq!(balance(&h, "alice"), 100);
}

#[tokio::test]
async fn test_trade_with_self_rejected() {
    let h = harness();
    register(&h, "alice", "Alice").await;
    buy_tokens(&h, "alice", 100).await;

    let result = h.engine.trade_tokens("alice", "Alice", 10).await;
    assert!(matches!(result, Err(LedgerError::InvalidArgument(_))));
    assert_eq!(balance(&h, "alice"), 100);
}

#[tokio::test]
async fn test_concurrent_trades_serialize_per_user() {
    use std::sync::Arc;

    let h = Arc::new(harness());
    register(&h, "alice", "Alice").await;
    register(&h, "bob", "Bob").await;
    buy_tokens(&h, "alice", 100).await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let h = Arc::clone(&h);
        handles.push(tokio::spawn(async move {
            h.engine.trade_tokens("alice", "Bob", 10).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(balance(&h, "alice"), 0);
    assert_eq!(balance(&h, "bob"), 100);
}

#[tokio::test]
async fn test_trade_amount_bounds() {
    let h = harness();
    register(&h, "alice", "Alice").await;
    register(&h, "bob", "Bob").await;

    assert!(matches!(
        h.engine.trade_tokens("alice", "Bob", 0).await,
        Err(LedgerError::InvalidArgument(_))
    ));
    assert!(matches!(
        h.engine.trade_tokens("alice", "Bob", 100_001).await,
        Err(LedgerError::InvalidArgument(_))
    ));
}
