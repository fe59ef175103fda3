//! Best-effort synchronization of media-service entitlements.
//!
//! Invoked strictly after the ledger transaction has committed. A collaborator
//! failure here is logged and swallowed; the financial transition stands and
//! provisioning state is reconciled again on the next status read.

use crate::domain::plan::{self, PlanTier};
use crate::domain::ports::MediaProvisioner;
use crate::domain::user::User;

/// Pushes the entitlement and request quota for `tier` to every media account
/// linked to the user.
pub(crate) async fn sync_entitlements(
    provisioner: &dyn MediaProvisioner,
    user: &User,
    tier: PlanTier,
) {
    let entitlement = plan::entitlement_for(tier);
    let (movie_limit, tv_limit) = plan::request_quota_for(tier);
    for (service, account_id) in user.linked_accounts() {
        match provisioner.account_exists(account_id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(service, account_id, "linked media account no longer exists");
                continue;
            }
            Err(e) => {
                tracing::warn!(service, account_id, error = %e, "account lookup failed");
                continue;
            }
        }
        if let Err(e) = provisioner.set_entitlement(account_id, entitlement).await {
            tracing::warn!(service, account_id, error = %e, "entitlement sync failed");
        }
        if let Err(e) = provisioner
            .set_request_quota(account_id, movie_limit, tv_limit)
            .await
        {
            tracing::warn!(service, account_id, error = %e, "request quota sync failed");
        }
    }
}

/// Disables every media account linked to the user.
pub(crate) async fn disable_all(provisioner: &dyn MediaProvisioner, user: &User) {
    for (service, account_id) in user.linked_accounts() {
        if let Err(e) = provisioner.disable(account_id).await {
            tracing::warn!(service, account_id, error = %e, "disable failed");
        }
    }
}
