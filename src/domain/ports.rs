use crate::domain::plan::Entitlement;
use crate::domain::records::{Redemption, Tip, TokenPurchase, Trade};
use crate::domain::subscription::Subscription;
use crate::domain::user::User;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One serializable unit of work against the ledger store.
///
/// Everything the state machine reads inside the closure is re-validated by
/// the store on commit; a write-write conflict aborts the attempt and the
/// whole closure is re-run against fresh state. Nothing written here is
/// visible to other units of work before commit.
pub trait StoreTx {
    fn user(&mut self, user_id: &str) -> Result<Option<User>>;
    fn user_by_username(&mut self, normalized: &str) -> Result<Option<User>>;
    fn put_user(&mut self, user: User) -> Result<()>;

    /// Atomic relative adjustment; never a read-modify-write of the document.
    fn credit_tokens(&mut self, user_id: &str, tokens: u64) -> Result<u64>;
    /// Checked atomic decrement. Fails the transaction with
    /// `InsufficientBalance` rather than letting the balance go negative.
    fn debit_tokens(&mut self, user_id: &str, tokens: u64) -> Result<u64>;

    /// The at-most-one `active` subscription for a user, via the store index.
    fn active_subscription(&mut self, user_id: &str) -> Result<Option<Subscription>>;
    fn put_subscription(&mut self, sub: Subscription) -> Result<()>;

    /// Idempotency probes: true once a settled order id has been recorded.
    fn purchase_order_applied(&mut self, order_id: &str) -> Result<bool>;
    fn tip_order_applied(&mut self, order_id: &str) -> Result<bool>;

    fn put_purchase(&mut self, rec: TokenPurchase) -> Result<()>;
    fn put_tip(&mut self, rec: Tip) -> Result<()>;
    fn put_trade(&mut self, rec: Trade) -> Result<()>;
    fn put_redemption(&mut self, rec: Redemption) -> Result<()>;
}

/// Document store with serializable transactions and optimistic retry.
pub trait LedgerStore: Send + Sync {
    /// Runs `body` as one transaction, retrying on write-write conflict.
    /// The closure may run more than once and must not carry side effects
    /// other than its writes through the transaction handle.
    fn transact<T, F>(&self, body: F) -> Result<T>
    where
        F: FnMut(&mut dyn StoreTx) -> Result<T>;

    /// Snapshot of every user, for reporting. Not transactional.
    fn list_users(&self) -> Result<Vec<User>>;
}

/// Order details as reported by the payment collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDetails {
    pub custom_id: String,
    pub amount: String,
    pub currency: String,
}

/// Capture outcome; the ledger is only touched when `status == "COMPLETED"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOutcome {
    pub status: String,
}

/// Black-box payment authorization/capture protocol.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, amount: &str, currency: &str, custom_id: &str) -> Result<String>;
    async fn get_order(&self, order_id: &str) -> Result<OrderDetails>;
    async fn capture_order(&self, order_id: &str) -> Result<CaptureOutcome>;
}

/// Externally provisioned media accounts. Calls happen strictly after the
/// ledger transaction commits; failures are logged and swallowed.
#[async_trait]
pub trait MediaProvisioner: Send + Sync {
    async fn account_exists(&self, account_id: &str) -> Result<bool>;
    async fn set_entitlement(&self, account_id: &str, entitlement: Entitlement) -> Result<()>;
    async fn set_request_quota(
        &self,
        account_id: &str,
        movie_limit: u32,
        tv_limit: u32,
    ) -> Result<()>;
    async fn disable(&self, account_id: &str) -> Result<()>;
}

/// Time source, injectable so tests can drive expiry and scheduled downgrades.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
