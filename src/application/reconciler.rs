//! Lazy read-time reconciliation of subscription state.
//!
//! There is no background scheduler: every status read advances expiry and due
//! scheduled downgrades inside one store transaction, then drives the
//! provisioning side effects after commit. A periodic sweep can call
//! [`LedgerEngine::subscription_status`] on a cadence without changing
//! correctness, since the read path stands alone.

use crate::application::engine::LedgerEngine;
use crate::application::provisioning;
use crate::domain::plan::{self, PlanTier};
use crate::domain::ports::{LedgerStore, StoreTx};
use crate::domain::records::{Redemption, RedemptionKind};
use crate::domain::subscription::{Subscription, SubscriptionStatus};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Months, Utc};
use uuid::Uuid;

/// Resolved view of "what plan is active now".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusView {
    pub has_active_subscription: bool,
    /// The active record, including any pending downgrade for client display.
    pub subscription: Option<Subscription>,
    pub days_remaining: i64,
}

/// Provisioning follow-up owed after the reconciling transaction commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Followup {
    None,
    Sync(PlanTier),
    Disable,
}

impl<S: LedgerStore> LedgerEngine<S> {
    /// Returns the user's current subscription state, first applying any
    /// transition that has become due since the last read.
    pub async fn subscription_status(&self, user_id: &str) -> Result<StatusView> {
        let now = self.clock.now();

        let (user, current, followup) = self.store.transact(|tx| {
            let user = tx
                .user(user_id)?
                .ok_or_else(|| LedgerError::NotFound(format!("user {user_id}")))?;
            let mut followup = Followup::None;
            let mut current = tx.active_subscription(user_id)?;

            // A downgrade executed here starts a record that may itself be
            // past due when the user has been away long enough, so loop until
            // no transition applies.
            while let Some(sub) = current.clone() {
                let due_downgrade = sub
                    .scheduled_downgrade
                    .clone()
                    .filter(|d| d.scheduled_for <= now);

                if let Some(scheduled) = due_downgrade {
                    let cost = plan::plan_cost(scheduled.tier, scheduled.period, scheduled.duration);
                    let balance = tx
                        .user(user_id)?
                        .map(|u| u.token_balance)
                        .unwrap_or_default();

                    if balance < cost {
                        // Cannot fund the downgrade: force-expire instead of
                        // leaving a stale entitlement.
                        let mut expired = sub;
                        expired.status = SubscriptionStatus::Expired;
                        expired.scheduled_downgrade = None;
                        tx.put_subscription(expired)?;
                        followup = Followup::Disable;
                        current = None;
                    } else {
                        tx.debit_tokens(user_id, cost)?;
                        let new_id = Uuid::new_v4().to_string();

                        let mut completed = sub;
                        completed.status = SubscriptionStatus::Completed;
                        completed.scheduled_downgrade = None;
                        completed.downgraded_to = Some(new_id.clone());
                        tx.put_subscription(completed)?;

                        let mut next = Subscription::new_active(
                            new_id,
                            user_id,
                            scheduled.tier,
                            scheduled.period,
                            scheduled.duration,
                            cost,
                            scheduled.scheduled_for,
                            plan::advance_periods(
                                scheduled.scheduled_for,
                                scheduled.period,
                                scheduled.duration,
                            )?,
                        );
                        next.from_downgrade = true;
                        tx.put_subscription(next.clone())?;
                        tx.put_redemption(Redemption {
                            redemption_id: Uuid::new_v4().to_string(),
                            user_id: user_id.to_string(),
                            subscription_id: next.subscription_id.clone(),
                            token_cost: cost,
                            kind: RedemptionKind::ScheduledDowngrade,
                            created_at: now,
                        })?;
                        followup = Followup::Sync(scheduled.tier);
                        current = Some(next);
                    }
                } else if sub.end_date <= now {
                    let mut expired = sub;
                    expired.status = SubscriptionStatus::Expired;
                    tx.put_subscription(expired)?;
                    followup = Followup::Disable;
                    current = None;
                } else {
                    current = Some(reset_usage_counters(tx, sub, now)?);
                    break;
                }
            }

            Ok((user, current, followup))
        })?;

        match followup {
            Followup::Disable => {
                tracing::debug!(user_id, "subscription expired");
                provisioning::disable_all(self.provisioner.as_ref(), &user).await;
            }
            Followup::Sync(tier) => {
                tracing::debug!(user_id, tier = tier.as_str(), "scheduled downgrade executed");
                provisioning::sync_entitlements(self.provisioner.as_ref(), &user, tier).await;
            }
            Followup::None => {}
        }

        let days_remaining = current.as_ref().map_or(0, |s| s.days_remaining(now));
        Ok(StatusView {
            has_active_subscription: current.is_some(),
            subscription: current,
            days_remaining,
        })
    }
}

/// Clears the monthly request counters once a calendar month has elapsed
/// since the last reset, anchoring the reset date to the billing day.
fn reset_usage_counters(
    tx: &mut dyn StoreTx,
    mut sub: Subscription,
    now: DateTime<Utc>,
) -> Result<Subscription> {
    let mut reset_date = sub.last_reset_date;
    let mut advanced = false;
    while let Some(next) = reset_date.checked_add_months(Months::new(1))
        && next <= now
    {
        reset_date = next;
        advanced = true;
    }
    if advanced {
        sub.movie_requests_used = 0;
        sub.tv_requests_used = 0;
        sub.last_reset_date = reset_date;
        tx.put_subscription(sub.clone())?;
    }
    Ok(sub)
}
