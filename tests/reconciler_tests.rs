mod common;

use chrono::Duration;
use common::{balance, buy_tokens, harness, register};
use tokenledger::domain::plan::{BillingPeriod, PlanTier};
use tokenledger::domain::ports::Clock;
use tokenledger::domain::subscription::SubscriptionStatus;

#[tokio::test]
async fn test_status_read_expires_past_due_subscription() {
    let h = harness();
    register(&h, "alice", "Alice").await;
    buy_tokens(&h, "alice", 100).await;

    h.engine
        .change_subscription("alice", PlanTier::Standard, BillingPeriod::Monthly, 1, 0)
        .await
        .unwrap();

    h.clock.advance(Duration::days(32));
    let status = h.engine.subscription_status("alice").await.unwrap();

    assert!(!status.has_active_subscription);
    assert_eq!(status.subscription, None);
    assert_eq!(status.days_remaining, 0);
    assert_eq!(h.provisioner.disable_count("alice-plex"), 1);

    // A second read finds nothing to reconcile and disables nothing more.
    let again = h.engine.subscription_status("alice").await.unwrap();
    assert!(!again.has_active_subscription);
    assert_eq!(h.provisioner.disable_count("alice-plex"), 1);
}

#[tokio::test]
async fn test_status_read_before_expiry_reports_days_remaining() {
    let h = harness();
    register(&h, "alice", "Alice").await;
    buy_tokens(&h, "alice", 100).await;

    h.engine
        .change_subscription("alice", PlanTier::Standard, BillingPeriod::Monthly, 1, 0)
        .await
        .unwrap();

    // Jan 15 -> Feb 15 is a 31-day interval.
    let status = h.engine.subscription_status("alice").await.unwrap();
    assert!(status.has_active_subscription);
    assert_eq!(status.days_remaining, 31);

    h.clock.advance(Duration::days(30) + Duration::hours(1));
    let status = h.engine.subscription_status("alice").await.unwrap();
    assert!(status.has_active_subscription);
    assert_eq!(status.days_remaining, 1);
}

#[tokio::test]
async fn test_due_downgrade_executes_on_read() {
    let h = harness();
    register(&h, "alice", "Alice").await;
    buy_tokens(&h, "alice", 500).await;

    h.engine
        .change_subscription("alice", PlanTier::Family, BillingPeriod::Monthly, 1, 0)
        .await
        .unwrap();
    h.engine
        .change_subscription("alice", PlanTier::Standard, BillingPeriod::Monthly, 1, 0)
        .await
        .unwrap();
    let before = balance(&h, "alice");

    h.clock.advance(Duration::days(32));
    let status = h.engine.subscription_status("alice").await.unwrap();

    let active = status.subscription.unwrap();
    assert_eq!(active.tier, PlanTier::Standard);
    assert_eq!(active.status, SubscriptionStatus::Active);
    assert!(active.from_downgrade);
    assert_eq!(active.movie_requests_used, 0);
    assert_eq!(active.tv_requests_used, 0);
    assert_eq!(balance(&h, "alice"), before - 60);

    // New entitlement was pushed, nothing was disabled.
    let entitlement = h.provisioner.last_entitlement("alice-plex").unwrap();
    assert_eq!(entitlement.stream_limit, 2);
    assert_eq!(h.provisioner.disable_count("alice-plex"), 0);
}

#[tokio::test]
async fn test_due_downgrade_without_funds_forces_expiry() {
    let h = harness();
    register(&h, "alice", "Alice").await;
    buy_tokens(&h, "alice", 250).await;

    // Family costs 120, leaving 130; trade most of it away so the scheduled
    // standard downgrade (60) cannot be funded.
    register(&h, "bob", "Bob").await;
    h.engine
        .change_subscription("alice", PlanTier::Family, BillingPeriod::Monthly, 1, 0)
        .await
        .unwrap();
    h.engine
        .change_subscription("alice", PlanTier::Standard, BillingPeriod::Monthly, 1, 0)
        .await
        .unwrap();
    h.engine.trade_tokens("alice", "Bob", 100).await.unwrap();
    assert_eq!(balance(&h, "alice"), 30);

    h.clock.advance(Duration::days(32));
    let status = h.engine.subscription_status("alice").await.unwrap();

    assert!(!status.has_active_subscription);
    assert_eq!(h.provisioner.disable_count("alice-plex"), 1);
    // The unfunded downgrade did not debit anything.
    assert_eq!(balance(&h, "alice"), 30);
}

#[tokio::test]
async fn test_downgraded_record_that_is_itself_past_due_cascades() {
    let h = harness();
    register(&h, "alice", "Alice").await;
    buy_tokens(&h, "alice", 500).await;

    h.engine
        .change_subscription("alice", PlanTier::Family, BillingPeriod::Monthly, 1, 0)
        .await
        .unwrap();
    h.engine
        .change_subscription("alice", PlanTier::Standard, BillingPeriod::Monthly, 1, 0)
        .await
        .unwrap();

    // Stay away past the downgraded interval as well: the downgrade executes
    // and its record expires in the same read.
    h.clock.advance(Duration::days(70));
    let status = h.engine.subscription_status("alice").await.unwrap();

    assert!(!status.has_active_subscription);
    // Standard was still charged for its interval before expiring.
    assert_eq!(balance(&h, "alice"), 500 - 120 - 60);
    assert_eq!(h.provisioner.disable_count("alice-plex"), 1);
}

#[tokio::test]
async fn test_usage_counters_reset_after_a_month() {
    let h = harness();
    register(&h, "alice", "Alice").await;
    buy_tokens(&h, "alice", 1000).await;

    h.engine
        .change_subscription("alice", PlanTier::Standard, BillingPeriod::Yearly, 1, 0)
        .await
        .unwrap();

    h.clock.advance(Duration::days(40));
    let status = h.engine.subscription_status("alice").await.unwrap();
    let active = status.subscription.unwrap();

    assert_eq!(active.status, SubscriptionStatus::Active);
    assert_eq!(active.movie_requests_used, 0);
    assert_eq!(active.tv_requests_used, 0);
    // The reset anchors to the billing day, one month after start.
    assert!(active.last_reset_date > active.start_date);
    assert!(active.last_reset_date <= h.clock.now());
}

#[tokio::test]
async fn test_status_for_user_without_subscription() {
    let h = harness();
    register(&h, "alice", "Alice").await;

    let status = h.engine.subscription_status("alice").await.unwrap();
    assert!(!status.has_active_subscription);
    assert_eq!(status.days_remaining, 0);
}
