//! Immutable audit records. Each row is keyed by its own generated id and
//! carries the external reference that justifies the ledger mutation it
//! accompanies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Settled token purchase. At most one may ever exist per `order_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPurchase {
    pub purchase_id: String,
    pub user_id: String,
    pub order_id: String,
    pub tokens: u64,
    pub amount: String,
    pub currency: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Settled donation. At most one may ever exist per `order_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tip {
    pub tip_id: String,
    pub user_id: String,
    pub order_id: String,
    pub amount: String,
    pub currency: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Peer token transfer, written in the same transaction as both balance moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub tokens: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionKind {
    MediaSubscription,
    ScheduledDowngrade,
}

/// Audit of a token-cost event, linking a subscription to the tokens charged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    pub redemption_id: String,
    pub user_id: String,
    pub subscription_id: String,
    pub token_cost: u64,
    pub kind: RedemptionKind,
    pub created_at: DateTime<Utc>,
}
