//! The subscription state machine: purchase, upgrade, scheduled downgrade.
//!
//! Every branch runs inside one store transaction that re-fetches the active
//! subscription and the balance, so concurrent requests for the same user are
//! serialized by the store and the single-active invariant holds.

use crate::application::engine::LedgerEngine;
use crate::application::provisioning;
use crate::domain::plan::{self, BillingPeriod, PlanTier};
use crate::domain::ports::LedgerStore;
use crate::domain::records::{Redemption, RedemptionKind};
use crate::domain::subscription::{ScheduledDowngrade, Subscription, SubscriptionStatus};
use crate::domain::user::User;
use crate::error::{LedgerError, Result};
use uuid::Uuid;

/// Outcome of a create-or-change-subscription request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionChange {
    /// No subscription was active; a new one starts now.
    Created(Subscription),
    /// A higher tier was requested; the change applied immediately.
    Upgraded {
        previous: Subscription,
        current: Subscription,
    },
    /// A lower tier was requested; it executes at the current expiry.
    DowngradeScheduled(Subscription),
}

impl<S: LedgerStore> LedgerEngine<S> {
    /// Creates, upgrades or schedules a change of the user's subscription.
    ///
    /// `pro_rate_credit` is an externally computed, already-validated token
    /// discount; it only applies to immediate upgrades and floors the cost at
    /// zero.
    pub async fn change_subscription(
        &self,
        user_id: &str,
        tier: PlanTier,
        period: BillingPeriod,
        duration: u32,
        pro_rate_credit: u64,
    ) -> Result<SubscriptionChange> {
        let duration = plan::validate_duration(duration)?;
        let now = self.clock.now();

        let (change, user) = self.store.transact(|tx| {
            let user = tx
                .user(user_id)?
                .ok_or_else(|| LedgerError::NotFound(format!("user {user_id}")))?;

            let change = match tx.active_subscription(user_id)? {
                None => {
                    let cost = plan::plan_cost(tier, period, duration);
                    Self::check_balance(&user, cost)?;
                    tx.debit_tokens(user_id, cost)?;
                    let sub = Subscription::new_active(
                        Uuid::new_v4().to_string(),
                        user_id,
                        tier,
                        period,
                        duration,
                        cost,
                        now,
                        plan::advance_periods(now, period, duration)?,
                    );
                    tx.put_subscription(sub.clone())?;
                    tx.put_redemption(Redemption {
                        redemption_id: Uuid::new_v4().to_string(),
                        user_id: user_id.to_string(),
                        subscription_id: sub.subscription_id.clone(),
                        token_cost: cost,
                        kind: RedemptionKind::MediaSubscription,
                        created_at: now,
                    })?;
                    SubscriptionChange::Created(sub)
                }
                Some(mut current) if tier > current.tier => {
                    let cost =
                        plan::plan_cost(tier, period, duration).saturating_sub(pro_rate_credit);
                    Self::check_balance(&user, cost)?;
                    tx.debit_tokens(user_id, cost)?;

                    current.status = SubscriptionStatus::Upgraded;
                    // An upgrade supersedes any pending downgrade.
                    current.scheduled_downgrade = None;
                    tx.put_subscription(current.clone())?;

                    let sub = Subscription::new_active(
                        Uuid::new_v4().to_string(),
                        user_id,
                        tier,
                        period,
                        duration,
                        cost,
                        now,
                        plan::advance_periods(now, period, duration)?,
                    );
                    tx.put_subscription(sub.clone())?;
                    tx.put_redemption(Redemption {
                        redemption_id: Uuid::new_v4().to_string(),
                        user_id: user_id.to_string(),
                        subscription_id: sub.subscription_id.clone(),
                        token_cost: cost,
                        kind: RedemptionKind::MediaSubscription,
                        created_at: now,
                    })?;
                    SubscriptionChange::Upgraded { previous: current, current: sub }
                }
                Some(mut current) if tier < current.tier => {
                    if let Some(scheduled) = &current.scheduled_downgrade
                        && scheduled.tier == tier
                    {
                        return Err(LedgerError::DuplicateOperation(format!(
                            "downgrade to {} already scheduled",
                            tier.as_str()
                        )));
                    }
                    // Deferred: nothing is charged and no record is created
                    // until the current subscription runs out.
                    current.scheduled_downgrade = Some(ScheduledDowngrade {
                        tier,
                        period,
                        duration,
                        scheduled_for: current.end_date,
                    });
                    current.auto_renew = false;
                    tx.put_subscription(current.clone())?;
                    SubscriptionChange::DowngradeScheduled(current)
                }
                Some(current) => {
                    return Err(LedgerError::FailedPrecondition(format!(
                        "already subscribed to {}",
                        current.tier.as_str()
                    )));
                }
            };
            Ok((change, user))
        })?;

        match &change {
            SubscriptionChange::Created(sub) | SubscriptionChange::Upgraded { current: sub, .. } => {
                tracing::debug!(
                    user_id,
                    tier = sub.tier.as_str(),
                    cost = sub.token_cost,
                    "subscription activated"
                );
                provisioning::sync_entitlements(self.provisioner.as_ref(), &user, sub.tier).await;
            }
            SubscriptionChange::DowngradeScheduled(sub) => {
                tracing::debug!(
                    user_id,
                    scheduled_for = %sub.end_date,
                    "downgrade scheduled"
                );
            }
        }
        Ok(change)
    }

    /// Removes a pending scheduled downgrade and restores auto-renew.
    pub async fn cancel_scheduled_downgrade(&self, user_id: &str) -> Result<Subscription> {
        self.store.transact(|tx| {
            let mut current = tx
                .active_subscription(user_id)?
                .ok_or_else(|| LedgerError::NotFound("no active subscription".to_string()))?;
            if current.scheduled_downgrade.is_none() {
                return Err(LedgerError::NotFound("no scheduled downgrade".to_string()));
            }
            current.scheduled_downgrade = None;
            current.auto_renew = true;
            tx.put_subscription(current.clone())?;
            Ok(current)
        })
    }

    fn check_balance(user: &User, cost: u64) -> Result<()> {
        if user.token_balance < cost {
            return Err(LedgerError::InsufficientBalance {
                required: cost,
                available: user.token_balance,
            });
        }
        Ok(())
    }
}
