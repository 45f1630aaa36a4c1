//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `http` - Axum REST API and provider webhook endpoint
//! - `postgres` - SQLx store, event log and access tokens
//! - `memory` - In-memory store, event log and access tokens
//! - `stripe` - Payment provider callbacks (Stripe and a recording mock)
//! - `notifications` - HTTP notification service and a log-only notifier

pub mod http;
pub mod memory;
pub mod notifications;
pub mod postgres;
pub mod stripe;
