use crate::error::{LedgerError, Result};
use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

/// Subscription plan tiers, declared low to high. The derived [`Ord`] follows
/// declaration order and is what decides upgrade vs downgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Basic,
    Standard,
    Family,
}

impl PlanTier {
    /// Explicit tier ordering, low to high. Fixed across deployments.
    pub const ALL: [PlanTier; 3] = [PlanTier::Basic, PlanTier::Standard, PlanTier::Family];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Basic => "basic",
            PlanTier::Standard => "standard",
            PlanTier::Family => "family",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(PlanTier::Basic),
            "standard" => Ok(PlanTier::Standard),
            "family" => Ok(PlanTier::Family),
            other => Err(LedgerError::InvalidArgument(format!(
                "unknown plan tier {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingPeriod {
    Monthly,
    Yearly,
}

impl BillingPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingPeriod::Monthly => "monthly",
            BillingPeriod::Yearly => "yearly",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" => Ok(BillingPeriod::Monthly),
            "yearly" => Ok(BillingPeriod::Yearly),
            other => Err(LedgerError::InvalidArgument(format!(
                "unknown billing period {other:?}"
            ))),
        }
    }
}

/// Longest subscription a single purchase may cover, in billing periods.
pub const MAX_DURATION: u32 = 12;

/// Validates a billing-period count.
pub fn validate_duration(duration: u32) -> Result<u32> {
    if duration == 0 || duration > MAX_DURATION {
        return Err(LedgerError::InvalidArgument(format!(
            "duration must be between 1 and {MAX_DURATION} periods"
        )));
    }
    Ok(duration)
}

/// Token rate for one billing period of the given tier.
pub fn period_rate(tier: PlanTier, period: BillingPeriod) -> u64 {
    match (tier, period) {
        (PlanTier::Basic, BillingPeriod::Monthly) => 30,
        (PlanTier::Basic, BillingPeriod::Yearly) => 300,
        (PlanTier::Standard, BillingPeriod::Monthly) => 60,
        (PlanTier::Standard, BillingPeriod::Yearly) => 600,
        (PlanTier::Family, BillingPeriod::Monthly) => 120,
        (PlanTier::Family, BillingPeriod::Yearly) => 1200,
    }
}

/// Full token cost of a subscription covering `duration` periods.
pub fn plan_cost(tier: PlanTier, period: BillingPeriod, duration: u32) -> u64 {
    period_rate(tier, period) * u64::from(duration)
}

/// Advances a timestamp by `duration` billing periods using calendar
/// arithmetic: the month (or year) field moves and month-end dates clamp to
/// the last valid day, so Jan 31 + 1 month lands on Feb 28/29.
pub fn advance_periods(
    start: DateTime<Utc>,
    period: BillingPeriod,
    duration: u32,
) -> Result<DateTime<Utc>> {
    let months = match period {
        BillingPeriod::Monthly => duration,
        BillingPeriod::Yearly => duration * 12,
    };
    start
        .checked_add_months(Months::new(months))
        .ok_or_else(|| LedgerError::Internal("subscription end date out of range".to_string()))
}

/// Media-service entitlement granted by a plan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entitlement {
    pub stream_limit: u32,
    pub allow_downloads: bool,
}

/// Entitlement the provisioning collaborator should apply for a tier.
pub fn entitlement_for(tier: PlanTier) -> Entitlement {
    match tier {
        PlanTier::Basic => Entitlement { stream_limit: 1, allow_downloads: false },
        PlanTier::Standard => Entitlement { stream_limit: 2, allow_downloads: true },
        PlanTier::Family => Entitlement { stream_limit: 4, allow_downloads: true },
    }
}

/// Monthly (movie, tv) request quota for a tier.
pub fn request_quota_for(tier: PlanTier) -> (u32, u32) {
    match tier {
        PlanTier::Basic => (2, 2),
        PlanTier::Standard => (5, 5),
        PlanTier::Family => (10, 10),
    }
}
