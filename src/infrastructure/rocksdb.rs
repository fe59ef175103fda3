use crate::domain::ports::{LedgerStore, StoreTx};
use crate::domain::records::{Redemption, Tip, TokenPurchase, Trade};
use crate::domain::subscription::{Subscription, SubscriptionStatus};
use crate::domain::user::User;
use crate::error::{LedgerError, Result};
use rocksdb::{Direction, IteratorMode, OptimisticTransactionDB, Options, Transaction};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

const USER_PREFIX: &str = "user/";
const USERNAME_PREFIX: &str = "uname/";
const SUB_PREFIX: &str = "sub/";
const ACTIVE_PREFIX: &str = "active/";
const PURCHASE_PREFIX: &str = "purchase/";
const PURCHASE_ORDER_PREFIX: &str = "po/";
const TIP_PREFIX: &str = "tip/";
const TIP_ORDER_PREFIX: &str = "to/";
const TRADE_PREFIX: &str = "trade/";
const REDEMPTION_PREFIX: &str = "redemption/";

const MAX_RETRIES: usize = 16;

/// Persistent ledger store backed by RocksDB's optimistic transactions.
///
/// Every read inside a unit of work goes through `get_for_update`, so the
/// commit detects write-write conflicts on the same documents and the closure
/// is re-run instead of both writes silently applying.
///
/// This struct is thread-safe (`Clone` shares the underlying database).
#[derive(Clone)]
pub struct RocksStore {
    db: Arc<OptimisticTransactionDB>,
}

impl RocksStore {
    /// Opens or creates a RocksDB instance at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = OptimisticTransactionDB::open(&opts, path)?;
        Ok(Self { db: Arc::new(db) })
    }
}

struct RocksTx<'db> {
    txn: &'db Transaction<'db, OptimisticTransactionDB>,
}

impl RocksTx<'_> {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.txn.get_for_update(key.as_bytes(), true)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.txn.put(key.as_bytes(), serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn get_string(&self, key: &str) -> Result<Option<String>> {
        match self.txn.get_for_update(key.as_bytes(), true)? {
            Some(bytes) => Ok(Some(String::from_utf8(bytes).map_err(|_| {
                LedgerError::Internal(format!("corrupt index entry at {key}"))
            })?)),
            None => Ok(None),
        }
    }
}

impl StoreTx for RocksTx<'_> {
    fn user(&mut self, user_id: &str) -> Result<Option<User>> {
        self.get_json(&format!("{USER_PREFIX}{user_id}"))
    }

    fn user_by_username(&mut self, normalized: &str) -> Result<Option<User>> {
        match self.get_string(&format!("{USERNAME_PREFIX}{normalized}"))? {
            Some(user_id) => self.user(&user_id),
            None => Ok(None),
        }
    }

    fn put_user(&mut self, user: User) -> Result<()> {
        self.txn.put(
            format!("{USERNAME_PREFIX}{}", user.normalized_username).as_bytes(),
            user.user_id.as_bytes(),
        )?;
        self.put_json(&format!("{USER_PREFIX}{}", user.user_id), &user)
    }

    fn credit_tokens(&mut self, user_id: &str, tokens: u64) -> Result<u64> {
        let mut user = self
            .user(user_id)?
            .ok_or_else(|| LedgerError::NotFound(format!("user {user_id}")))?;
        user.token_balance = user
            .token_balance
            .checked_add(tokens)
            .ok_or_else(|| LedgerError::Internal("token balance overflow".to_string()))?;
        let balance = user.token_balance;
        self.put_user(user)?;
        Ok(balance)
    }

    fn debit_tokens(&mut self, user_id: &str, tokens: u64) -> Result<u64> {
        let mut user = self
            .user(user_id)?
            .ok_or_else(|| LedgerError::NotFound(format!("user {user_id}")))?;
        if user.token_balance < tokens {
            return Err(LedgerError::InsufficientBalance {
                required: tokens,
                available: user.token_balance,
            });
        }
        user.token_balance -= tokens;
        let balance = user.token_balance;
        self.put_user(user)?;
        Ok(balance)
    }

    fn active_subscription(&mut self, user_id: &str) -> Result<Option<Subscription>> {
        match self.get_string(&format!("{ACTIVE_PREFIX}{user_id}"))? {
            Some(sub_id) => self.get_json(&format!("{SUB_PREFIX}{sub_id}")),
            None => Ok(None),
        }
    }

    fn put_subscription(&mut self, sub: Subscription) -> Result<()> {
        let index_key = format!("{ACTIVE_PREFIX}{}", sub.user_id);
        if sub.status == SubscriptionStatus::Active {
            if let Some(existing) = self.get_string(&index_key)?
                && existing != sub.subscription_id
            {
                return Err(LedgerError::Internal(format!(
                    "second active subscription for user {}",
                    sub.user_id
                )));
            }
            self.txn
                .put(index_key.as_bytes(), sub.subscription_id.as_bytes())?;
        } else if self.get_string(&index_key)?.as_deref() == Some(&sub.subscription_id) {
            self.txn.delete(index_key.as_bytes())?;
        }
        self.put_json(&format!("{SUB_PREFIX}{}", sub.subscription_id), &sub)
    }

    fn purchase_order_applied(&mut self, order_id: &str) -> Result<bool> {
        Ok(self
            .get_string(&format!("{PURCHASE_ORDER_PREFIX}{order_id}"))?
            .is_some())
    }

    fn tip_order_applied(&mut self, order_id: &str) -> Result<bool> {
        Ok(self
            .get_string(&format!("{TIP_ORDER_PREFIX}{order_id}"))?
            .is_some())
    }

    fn put_purchase(&mut self, rec: TokenPurchase) -> Result<()> {
        self.txn.put(
            format!("{PURCHASE_ORDER_PREFIX}{}", rec.order_id).as_bytes(),
            rec.purchase_id.as_bytes(),
        )?;
        self.put_json(&format!("{PURCHASE_PREFIX}{}", rec.purchase_id), &rec)
    }

    fn put_tip(&mut self, rec: Tip) -> Result<()> {
        self.txn.put(
            format!("{TIP_ORDER_PREFIX}{}", rec.order_id).as_bytes(),
            rec.tip_id.as_bytes(),
        )?;
        self.put_json(&format!("{TIP_PREFIX}{}", rec.tip_id), &rec)
    }

    fn put_trade(&mut self, rec: Trade) -> Result<()> {
        self.put_json(&format!("{TRADE_PREFIX}{}", rec.trade_id), &rec)
    }

    fn put_redemption(&mut self, rec: Redemption) -> Result<()> {
        self.put_json(&format!("{REDEMPTION_PREFIX}{}", rec.redemption_id), &rec)
    }
}

impl LedgerStore for RocksStore {
    fn transact<T, F>(&self, mut body: F) -> Result<T>
    where
        F: FnMut(&mut dyn StoreTx) -> Result<T>,
    {
        for _ in 0..MAX_RETRIES {
            let txn = self.db.transaction();
            let mut wrapper = RocksTx { txn: &txn };
            match body(&mut wrapper) {
                Ok(value) => match txn.commit() {
                    Ok(()) => return Ok(value),
                    // Conflict detected at commit: re-run against fresh state.
                    Err(e)
                        if matches!(
                            e.kind(),
                            rocksdb::ErrorKind::Busy | rocksdb::ErrorKind::TryAgain
                        ) =>
                    {
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                },
                Err(LedgerError::Conflict) => continue,
                Err(e) => {
                    let _ = txn.rollback();
                    return Err(e);
                }
            }
        }
        Err(LedgerError::Conflict)
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let mut users = Vec::new();
        let iter = self.db.iterator(IteratorMode::From(
            USER_PREFIX.as_bytes(),
            Direction::Forward,
        ));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(USER_PREFIX.as_bytes()) {
                break;
            }
            users.push(serde_json::from_slice(&value)?);
        }
        Ok(users)
    }
}
