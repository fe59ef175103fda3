//! Offline stand-ins for the external collaborators: a payment gateway whose
//! orders settle instantly, a provisioner that accepts everything, and a clock
//! that tests can move by hand. The CLI driver runs against these.

use crate::domain::plan::Entitlement;
use crate::domain::ports::{
    CaptureOutcome, Clock, MediaProvisioner, OrderDetails, PaymentGateway,
};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Payment gateway where every created order is immediately capturable.
#[derive(Default, Clone)]
pub struct SandboxGateway {
    orders: Arc<Mutex<HashMap<String, OrderDetails>>>,
    capture_status: Arc<Mutex<String>>,
}

impl SandboxGateway {
    pub fn new() -> Self {
        Self {
            orders: Arc::default(),
            capture_status: Arc::new(Mutex::new("COMPLETED".to_string())),
        }
    }

    /// Makes subsequent captures report the given status instead of
    /// `COMPLETED`, to exercise the failed-capture path.
    pub fn set_capture_status(&self, status: &str) {
        *self.capture_status.lock().unwrap_or_else(|e| e.into_inner()) = status.to_string();
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn create_order(&self, amount: &str, currency: &str, custom_id: &str) -> Result<String> {
        let order_id = format!("ORD-{}", Uuid::new_v4());
        self.orders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                order_id.clone(),
                OrderDetails {
                    custom_id: custom_id.to_string(),
                    amount: amount.to_string(),
                    currency: currency.to_string(),
                },
            );
        Ok(order_id)
    }

    async fn get_order(&self, order_id: &str) -> Result<OrderDetails> {
        self.orders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(order_id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("order {order_id}")))
    }

    async fn capture_order(&self, order_id: &str) -> Result<CaptureOutcome> {
        if !self
            .orders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(order_id)
        {
            return Err(LedgerError::NotFound(format!("order {order_id}")));
        }
        let status = self
            .capture_status
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        Ok(CaptureOutcome { status })
    }
}

/// Provisioner that acknowledges every call. Useful when running the engine
/// without a media backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProvisioner;

#[async_trait]
impl MediaProvisioner for NullProvisioner {
    async fn account_exists(&self, _account_id: &str) -> Result<bool> {
        Ok(true)
    }

    async fn set_entitlement(&self, account_id: &str, entitlement: Entitlement) -> Result<()> {
        tracing::debug!(account_id, stream_limit = entitlement.stream_limit, "entitlement set");
        Ok(())
    }

    async fn set_request_quota(
        &self,
        account_id: &str,
        movie_limit: u32,
        tv_limit: u32,
    ) -> Result<()> {
        tracing::debug!(account_id, movie_limit, tv_limit, "request quota set");
        Ok(())
    }

    async fn disable(&self, account_id: &str) -> Result<()> {
        tracing::debug!(account_id, "account disabled");
        Ok(())
    }
}

/// A clock that only moves when told to.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Arc::new(Mutex::new(start)) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
