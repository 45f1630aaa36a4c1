//! Subscription Core - Subscription lifecycle state machine.
//!
//! Ingests signed payment provider webhooks exactly once, moves each
//! subscription through a single transition engine guarded by
//! compare-and-swap writes, and runs periodic policy sweeps for trial
//! expiry, dunning retries, pause windows and outreach notifications.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
