use crate::domain::plan::{BillingPeriod, PlanTier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Upgraded,
    Completed,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Upgraded => "upgraded",
            SubscriptionStatus::Completed => "completed",
        }
    }
}

/// A deferred plan change recorded on the currently active subscription,
/// executed at that subscription's natural expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledDowngrade {
    pub tier: PlanTier,
    pub period: BillingPeriod,
    pub duration: u32,
    pub scheduled_for: DateTime<Utc>,
}

/// One billing interval of entitlement.
///
/// At most one subscription per user holds `status = active` at any instant;
/// the store's active-subscription index enforces it and the state machine
/// never creates a second active record without transitioning the current one
/// out of `active` in the same transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub subscription_id: String,
    pub user_id: String,
    pub tier: PlanTier,
    pub period: BillingPeriod,
    pub duration: u32,
    pub token_cost: u64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: SubscriptionStatus,
    pub auto_renew: bool,
    pub scheduled_downgrade: Option<ScheduledDowngrade>,
    pub movie_requests_used: u32,
    pub tv_requests_used: u32,
    pub last_reset_date: DateTime<Utc>,
    /// Set on a `completed` record, pointing at the subscription the scheduled
    /// downgrade produced.
    pub downgraded_to: Option<String>,
    pub from_downgrade: bool,
}

impl Subscription {
    #[allow(clippy::too_many_arguments)]
    pub fn new_active(
        subscription_id: String,
        user_id: &str,
        tier: PlanTier,
        period: BillingPeriod,
        duration: u32,
        token_cost: u64,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Self {
        Self {
            subscription_id,
            user_id: user_id.to_string(),
            tier,
            period,
            duration,
            token_cost,
            start_date,
            end_date,
            status: SubscriptionStatus::Active,
            auto_renew: true,
            scheduled_downgrade: None,
            movie_requests_used: 0,
            tv_requests_used: 0,
            last_reset_date: start_date,
            downgraded_to: None,
            from_downgrade: false,
        }
    }

    /// Whole days until expiry, rounded up. Zero once the record is past due.
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        let secs = (self.end_date - now).num_seconds();
        if secs <= 0 {
            return 0;
        }
        (secs + 86_399) / 86_400
    }
}
