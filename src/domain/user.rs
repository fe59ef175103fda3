use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Link between a ledger user and an account on a backing media service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLink {
    pub linked: bool,
    pub service_account_id: String,
    pub status: String,
}

/// A ledger account holder.
///
/// The balance is only ever mutated through the store's atomic
/// credit/debit operations; the engine never writes a read-modified copy back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub normalized_username: String,
    pub token_balance: u64,
    /// Media services this user is provisioned on, keyed by service name.
    pub services: BTreeMap<String, ServiceLink>,
}

impl User {
    pub fn new(user_id: &str, email: &str, username: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            email: email.to_string(),
            normalized_username: normalize_username(username),
            token_balance: 0,
            services: BTreeMap::new(),
        }
    }

    /// Accounts the provisioning synchronizer should target.
    pub fn linked_accounts(&self) -> impl Iterator<Item = (&str, &str)> {
        self.services
            .iter()
            .filter(|(_, link)| link.linked)
            .map(|(name, link)| (name.as_str(), link.service_account_id.as_str()))
    }
}

/// Canonical form used for the username uniqueness check and receiver lookup.
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}
