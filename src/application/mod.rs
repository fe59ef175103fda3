//! Application layer containing the core business logic orchestration.
//!
//! This module defines the `LedgerEngine`, the single entry point for every
//! ledger and subscription operation. Each operation runs as one serializable
//! store transaction; external collaborator calls happen before (payment
//! verification) or after (provisioning) that transaction, never inside it.

pub mod engine;
pub mod provisioning;
pub mod reconciler;
pub mod subscriptions;
