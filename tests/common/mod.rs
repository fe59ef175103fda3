#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::{Arc, Mutex};
use tokenledger::application::engine::LedgerEngine;
use tokenledger::domain::plan::Entitlement;
use tokenledger::domain::ports::MediaProvisioner;
use tokenledger::error::Result;
use tokenledger::infrastructure::in_memory::InMemoryStore;
use tokenledger::infrastructure::sandbox::{ManualClock, SandboxGateway};

pub const SESSION: &str = "test-session";

/// Provisioner that remembers every call so tests can assert on side effects.
#[derive(Default, Clone)]
pub struct RecordingProvisioner {
    pub entitlements: Arc<Mutex<Vec<(String, Entitlement)>>>,
    pub quotas: Arc<Mutex<Vec<(String, u32, u32)>>>,
    pub disables: Arc<Mutex<Vec<String>>>,
}

impl RecordingProvisioner {
    pub fn disable_count(&self, account_id: &str) -> usize {
        self.disables
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.as_str() == account_id)
            .count()
    }

    pub fn last_entitlement(&self, account_id: &str) -> Option<Entitlement> {
        self.entitlements
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(a, _)| a == account_id)
            .map(|(_, e)| *e)
    }
}

#[async_trait]
impl MediaProvisioner for RecordingProvisioner {
    async fn account_exists(&self, _account_id: &str) -> Result<bool> {
        Ok(true)
    }

    async fn set_entitlement(&self, account_id: &str, entitlement: Entitlement) -> Result<()> {
        self.entitlements
            .lock()
            .unwrap()
            .push((account_id.to_string(), entitlement));
        Ok(())
    }

    async fn set_request_quota(
        &self,
        account_id: &str,
        movie_limit: u32,
        tv_limit: u32,
    ) -> Result<()> {
        self.quotas
            .lock()
            .unwrap()
            .push((account_id.to_string(), movie_limit, tv_limit));
        Ok(())
    }

    async fn disable(&self, account_id: &str) -> Result<()> {
        self.disables.lock().unwrap().push(account_id.to_string());
        Ok(())
    }
}

pub struct Harness {
    pub engine: LedgerEngine<InMemoryStore>,
    pub gateway: SandboxGateway,
    pub provisioner: RecordingProvisioner,
    pub clock: ManualClock,
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
}

pub fn harness() -> Harness {
    let gateway = SandboxGateway::new();
    let provisioner = RecordingProvisioner::default();
    let clock = ManualClock::new(epoch());
    let engine = LedgerEngine::new(
        InMemoryStore::new(),
        Arc::new(gateway.clone()),
        Arc::new(provisioner.clone()),
        Arc::new(clock.clone()),
    );
    Harness { engine, gateway, provisioner, clock }
}

/// Registers a user with a linked media account.
pub async fn register(h: &Harness, user_id: &str, username: &str) {
    h.engine
        .create_user(user_id, &format!("{user_id}@example.com"), username)
        .await
        .unwrap();
    h.engine
        .link_service(user_id, "plex", &format!("{user_id}-plex"))
        .await
        .unwrap();
}

/// Buys one catalog package through the sandbox gateway.
pub async fn buy_tokens(h: &Harness, user_id: &str, tokens: u64) {
    let order_id = h
        .engine
        .create_purchase_order(user_id, SESSION, tokens)
        .await
        .unwrap();
    h.engine
        .apply_purchase(user_id, SESSION, &order_id)
        .await
        .unwrap();
}

pub fn balance(h: &Harness, user_id: &str) -> u64 {
    h.engine.get_user(user_id).unwrap().token_balance
}
