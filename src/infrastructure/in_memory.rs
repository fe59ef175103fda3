use crate::domain::ports::{LedgerStore, StoreTx};
use crate::domain::records::{Redemption, Tip, TokenPurchase, Trade};
use crate::domain::subscription::{Subscription, SubscriptionStatus};
use crate::domain::user::User;
use crate::error::{LedgerError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default, Clone)]
struct Collections {
    users: HashMap<String, User>,
    /// normalized username -> user_id
    usernames: HashMap<String, String>,
    subscriptions: HashMap<String, Subscription>,
    /// user_id -> subscription_id of the single active record
    active_index: HashMap<String, String>,
    purchases: HashMap<String, TokenPurchase>,
    purchase_orders: HashSet<String>,
    tips: HashMap<String, Tip>,
    tip_orders: HashSet<String>,
    trades: HashMap<String, Trade>,
    redemptions: HashMap<String, Redemption>,
}

/// In-memory ledger store.
///
/// Transactions run under an exclusive write lock against a scratch copy of
/// the collections, which is swapped in only on success. One writer at a time
/// makes every unit of work trivially serializable; a failed closure leaves
/// no trace.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Collections>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

struct MemTx<'a> {
    data: &'a mut Collections,
}

impl StoreTx for MemTx<'_> {
    fn user(&mut self, user_id: &str) -> Result<Option<User>> {
        Ok(self.data.users.get(user_id).cloned())
    }

    fn user_by_username(&mut self, normalized: &str) -> Result<Option<User>> {
        Ok(self
            .data
            .usernames
            .get(normalized)
            .and_then(|id| self.data.users.get(id))
            .cloned())
    }

    fn put_user(&mut self, user: User) -> Result<()> {
        self.data
            .usernames
            .insert(user.normalized_username.clone(), user.user_id.clone());
        self.data.users.insert(user.user_id.clone(), user);
        Ok(())
    }

    fn credit_tokens(&mut self, user_id: &str, tokens: u64) -> Result<u64> {
        let user = self
            .data
            .users
            .get_mut(user_id)
            .ok_or_else(|| LedgerError::NotFound(format!("user {user_id}")))?;
        user.token_balance = user
            .token_balance
            .checked_add(tokens)
            .ok_or_else(|| LedgerError::Internal("token balance overflow".to_string()))?;
        Ok(user.token_balance)
    }

    fn debit_tokens(&mut self, user_id: &str, tokens: u64) -> Result<u64> {
        let user = self
            .data
            .users
            .get_mut(user_id)
            .ok_or_else(|| LedgerError::NotFound(format!("user {user_id}")))?;
        if user.token_balance < tokens {
            return Err(LedgerError::InsufficientBalance {
                required: tokens,
                available: user.token_balance,
            });
        }
        user.token_balance -= tokens;
        Ok(user.token_balance)
    }

    fn active_subscription(&mut self, user_id: &str) -> Result<Option<Subscription>> {
        Ok(self
            .data
            .active_index
            .get(user_id)
            .and_then(|id| self.data.subscriptions.get(id))
            .cloned())
    }

    fn put_subscription(&mut self, sub: Subscription) -> Result<()> {
        if sub.status == SubscriptionStatus::Active {
            if let Some(existing) = self.data.active_index.get(&sub.user_id)
                && existing != &sub.subscription_id
            {
                return Err(LedgerError::Internal(format!(
                    "second active subscription for user {}",
                    sub.user_id
                )));
            }
            self.data
                .active_index
                .insert(sub.user_id.clone(), sub.subscription_id.clone());
        } else if self.data.active_index.get(&sub.user_id) == Some(&sub.subscription_id) {
            self.data.active_index.remove(&sub.user_id);
        }
        self.data
            .subscriptions
            .insert(sub.subscription_id.clone(), sub);
        Ok(())
    }

    fn purchase_order_applied(&mut self, order_id: &str) -> Result<bool> {
        Ok(self.data.purchase_orders.contains(order_id))
    }

    fn tip_order_applied(&mut self, order_id: &str) -> Result<bool> {
        Ok(self.data.tip_orders.contains(order_id))
    }

    fn put_purchase(&mut self, rec: TokenPurchase) -> Result<()> {
        self.data.purchase_orders.insert(rec.order_id.clone());
        self.data.purchases.insert(rec.purchase_id.clone(), rec);
        Ok(())
    }

    fn put_tip(&mut self, rec: Tip) -> Result<()> {
        self.data.tip_orders.insert(rec.order_id.clone());
        self.data.tips.insert(rec.tip_id.clone(), rec);
        Ok(())
    }

    fn put_trade(&mut self, rec: Trade) -> Result<()> {
        self.data.trades.insert(rec.trade_id.clone(), rec);
        Ok(())
    }

    fn put_redemption(&mut self, rec: Redemption) -> Result<()> {
        self.data.redemptions.insert(rec.redemption_id.clone(), rec);
        Ok(())
    }
}

impl LedgerStore for InMemoryStore {
    fn transact<T, F>(&self, mut body: F) -> Result<T>
    where
        F: FnMut(&mut dyn StoreTx) -> Result<T>,
    {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| LedgerError::Internal("store lock poisoned".to_string()))?;
        let mut scratch = guard.clone();
        let result = body(&mut MemTx { data: &mut scratch })?;
        *guard = scratch;
        Ok(result)
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let guard = self
            .inner
            .read()
            .map_err(|_| LedgerError::Internal("store lock poisoned".to_string()))?;
        let mut users: Vec<User> = guard.users.values().cloned().collect();
        users.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(users)
    }
}
