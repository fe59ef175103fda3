use crate::domain::money::{
    self, CURRENCY, package_for_price, package_for_tokens, validate_tip_amount,
};
use crate::domain::ports::{Clock, LedgerStore, MediaProvisioner, PaymentGateway};
use crate::domain::records::{Tip, TokenPurchase, Trade};
use crate::domain::user::{self, ServiceLink, User};
use crate::error::{LedgerError, Result};
use std::sync::Arc;
use uuid::Uuid;

/// The subscription & token ledger engine.
///
/// Owns the persistent store and the external collaborator ports. Every
/// operation re-reads current state inside its own store transaction; nothing
/// is cached across invocations. Provisioning calls happen strictly after a
/// transaction commits and never roll it back.
pub struct LedgerEngine<S: LedgerStore> {
    pub(crate) store: S,
    pub(crate) gateway: Arc<dyn PaymentGateway>,
    pub(crate) provisioner: Arc<dyn MediaProvisioner>,
    pub(crate) clock: Arc<dyn Clock>,
}

/// Result of applying a captured purchase order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedPurchase {
    pub tokens: u64,
    pub balance: u64,
}

/// Result of a settled peer transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeReceipt {
    pub trade_id: String,
    pub sender_balance: u64,
}

impl<S: LedgerStore> LedgerEngine<S> {
    pub fn new(
        store: S,
        gateway: Arc<dyn PaymentGateway>,
        provisioner: Arc<dyn MediaProvisioner>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, gateway, provisioner, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Registers a new ledger user. Usernames are unique after normalization.
    pub async fn create_user(&self, user_id: &str, email: &str, username: &str) -> Result<User> {
        let normalized = user::normalize_username(username);
        if normalized.is_empty() {
            return Err(LedgerError::InvalidArgument(
                "username must not be empty".to_string(),
            ));
        }
        self.store.transact(|tx| {
            if tx.user(user_id)?.is_some() {
                return Err(LedgerError::AlreadyExists(format!("user {user_id}")));
            }
            if tx.user_by_username(&normalized)?.is_some() {
                return Err(LedgerError::AlreadyExists(format!(
                    "username {normalized:?} is taken"
                )));
            }
            let user = User::new(user_id, email, username);
            tx.put_user(user.clone())?;
            Ok(user)
        })
    }

    /// Records a link to an externally provisioned media-service account.
    /// The account must already exist on the collaborator side.
    pub async fn link_service(
        &self,
        user_id: &str,
        service: &str,
        account_id: &str,
    ) -> Result<()> {
        if !self.provisioner.account_exists(account_id).await? {
            return Err(LedgerError::NotFound(format!(
                "{service} account {account_id}"
            )));
        }
        self.store.transact(|tx| {
            let mut user = tx
                .user(user_id)?
                .ok_or_else(|| LedgerError::NotFound(format!("user {user_id}")))?;
            user.services.insert(
                service.to_string(),
                ServiceLink {
                    linked: true,
                    service_account_id: account_id.to_string(),
                    status: "linked".to_string(),
                },
            );
            tx.put_user(user)
        })
    }

    /// Creates a payment order for a catalog token package. The order's
    /// `custom_id` binds it to the requesting user and session.
    pub async fn create_purchase_order(
        &self,
        user_id: &str,
        session_id: &str,
        tokens: u64,
    ) -> Result<String> {
        let package = package_for_tokens(tokens)?;
        self.require_user(user_id)?;
        self.gateway
            .create_order(package.price, CURRENCY, &custom_id(user_id, session_id))
            .await
    }

    /// Applies a captured purchase order exactly once.
    ///
    /// The order is verified (owner, amount, currency) before capture is even
    /// attempted, and capture must report `COMPLETED` before the ledger is
    /// touched. The idempotency check runs twice: once up front so an
    /// already-settled order is never re-captured, and again inside the
    /// crediting transaction to close the check/write race.
    pub async fn apply_purchase(
        &self,
        user_id: &str,
        session_id: &str,
        order_id: &str,
    ) -> Result<AppliedPurchase> {
        let details = self.gateway.get_order(order_id).await?;
        verify_order_owner(&details.custom_id, user_id, session_id)?;
        let package = package_for_price(&details.amount, &details.currency)?;

        let already = self
            .store
            .transact(|tx| tx.purchase_order_applied(order_id))?;
        if already {
            return Err(LedgerError::DuplicateOperation(format!(
                "order {order_id} already applied"
            )));
        }

        let capture = self.gateway.capture_order(order_id).await?;
        if capture.status != "COMPLETED" {
            return Err(LedgerError::FailedPrecondition(format!(
                "payment capture returned status {:?}",
                capture.status
            )));
        }

        let now = self.clock.now();
        let applied = self.store.transact(|tx| {
            if tx.purchase_order_applied(order_id)? {
                return Err(LedgerError::DuplicateOperation(format!(
                    "order {order_id} already applied"
                )));
            }
            let balance = tx.credit_tokens(user_id, package.tokens)?;
            tx.put_purchase(TokenPurchase {
                purchase_id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                order_id: order_id.to_string(),
                tokens: package.tokens,
                amount: details.amount.clone(),
                currency: details.currency.clone(),
                status: "completed".to_string(),
                created_at: now,
            })?;
            Ok(AppliedPurchase { tokens: package.tokens, balance })
        })?;

        tracing::debug!(user_id, order_id, tokens = applied.tokens, "purchase applied");
        Ok(applied)
    }

    /// Creates a payment order for a free-form tip amount.
    pub async fn create_tip_order(
        &self,
        user_id: &str,
        session_id: &str,
        amount: &str,
    ) -> Result<String> {
        let amount = validate_tip_amount(amount)?;
        self.require_user(user_id)?;
        self.gateway
            .create_order(
                &amount.to_string(),
                CURRENCY,
                &custom_id(user_id, session_id),
            )
            .await
    }

    /// Records a captured tip exactly once. Tips do not move tokens; the
    /// audit record is the whole economic effect.
    pub async fn apply_tip(&self, user_id: &str, session_id: &str, order_id: &str) -> Result<()> {
        let details = self.gateway.get_order(order_id).await?;
        verify_order_owner(&details.custom_id, user_id, session_id)?;
        if details.currency != CURRENCY {
            return Err(LedgerError::FailedPrecondition(format!(
                "unsupported currency {:?}",
                details.currency
            )));
        }
        validate_tip_amount(&details.amount)?;

        let already = self.store.transact(|tx| tx.tip_order_applied(order_id))?;
        if already {
            return Err(LedgerError::DuplicateOperation(format!(
                "order {order_id} already applied"
            )));
        }

        let capture = self.gateway.capture_order(order_id).await?;
        if capture.status != "COMPLETED" {
            return Err(LedgerError::FailedPrecondition(format!(
                "payment capture returned status {:?}",
                capture.status
            )));
        }

        let now = self.clock.now();
        self.store.transact(|tx| {
            if tx.tip_order_applied(order_id)? {
                return Err(LedgerError::DuplicateOperation(format!(
                    "order {order_id} already applied"
                )));
            }
            tx.user(user_id)?
                .ok_or_else(|| LedgerError::NotFound(format!("user {user_id}")))?;
            tx.put_tip(Tip {
                tip_id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                order_id: order_id.to_string(),
                amount: details.amount.clone(),
                currency: details.currency.clone(),
                status: "completed".to_string(),
                created_at: now,
            })
        })?;

        tracing::debug!(user_id, order_id, "tip recorded");
        Ok(())
    }

    /// Atomic double-entry peer transfer: debit sender, credit receiver and
    /// write the audit row, all-or-nothing.
    pub async fn trade_tokens(
        &self,
        sender_id: &str,
        receiver_username: &str,
        tokens: u64,
    ) -> Result<TradeReceipt> {
        let tokens = money::validate_trade_tokens(tokens)?;
        let normalized = user::normalize_username(receiver_username);
        let now = self.clock.now();

        self.store.transact(|tx| {
            let sender = tx
                .user(sender_id)?
                .ok_or_else(|| LedgerError::NotFound(format!("user {sender_id}")))?;
            let receiver = tx.user_by_username(&normalized)?.ok_or_else(|| {
                LedgerError::NotFound(format!("user with username {normalized:?}"))
            })?;
            if receiver.user_id == sender.user_id {
                return Err(LedgerError::InvalidArgument(
                    "cannot trade tokens with yourself".to_string(),
                ));
            }

            let sender_balance = tx.debit_tokens(sender_id, tokens)?;
            tx.credit_tokens(&receiver.user_id, tokens)?;

            let trade_id = Uuid::new_v4().to_string();
            tx.put_trade(Trade {
                trade_id: trade_id.clone(),
                sender_id: sender_id.to_string(),
                receiver_id: receiver.user_id.clone(),
                tokens,
                created_at: now,
            })?;
            Ok(TradeReceipt { trade_id, sender_balance })
        })
    }

    /// Current snapshot of a user, balance included.
    pub fn get_user(&self, user_id: &str) -> Result<User> {
        self.require_user(user_id)
    }

    pub(crate) fn require_user(&self, user_id: &str) -> Result<User> {
        self.store.transact(|tx| {
            tx.user(user_id)?
                .ok_or_else(|| LedgerError::NotFound(format!("user {user_id}")))
        })
    }
}

fn custom_id(user_id: &str, session_id: &str) -> String {
    format!("{user_id}:{session_id}")
}

/// The order's `custom_id` must equal `"{user_id}:{session_id}"` exactly.
fn verify_order_owner(order_custom_id: &str, user_id: &str, session_id: &str) -> Result<()> {
    if order_custom_id != custom_id(user_id, session_id) {
        return Err(LedgerError::PermissionDenied(
            "order does not belong to this user session".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_order_owner() {
        assert!(verify_order_owner("u1:s1", "u1", "s1").is_ok());
        assert!(matches!(
            verify_order_owner("u2:s1", "u1", "s1"),
            Err(LedgerError::PermissionDenied(_))
        ));
        assert!(matches!(
            verify_order_owner("u1:other", "u1", "s1"),
            Err(LedgerError::PermissionDenied(_))
        ));
    }
}
