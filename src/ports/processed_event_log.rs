//! Processed event log port - idempotency for provider webhooks.
//!
//! Providers deliver at least once. Before any side effect runs, the event ID
//! is claimed here; it is marked processed only once every side effect for
//! it has been dispatched.
//!
//! A claim that is never marked processed (crash mid-processing) is a lease:
//! after [`CLAIM_LEASE_SECS`] a later delivery may claim it again.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, Timestamp};

/// Seconds an unprocessed claim blocks redelivery.
pub const CLAIM_LEASE_SECS: i64 = 600;

/// Result of trying to claim an event ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This caller owns the event and must process it.
    Claimed,
    /// The event was fully processed before.
    AlreadyProcessed,
    /// Another delivery holds a live claim.
    InFlight,
}

/// Port for recording which provider events have been processed.
#[async_trait]
pub trait ProcessedEventLog: Send + Sync {
    /// Atomically claim `event_id`. Exactly one concurrent caller gets
    /// `Claimed`.
    async fn try_claim(&self, event_id: &str, event_type: &str)
        -> Result<ClaimOutcome, DomainError>;

    /// Mark a claimed event as processed. Call AFTER dispatching side effects.
    async fn mark_processed(&self, event_id: &str) -> Result<(), DomainError>;

    /// Drop an unprocessed claim so redelivery can process the event.
    async fn release(&self, event_id: &str) -> Result<(), DomainError>;

    /// Delete processed entries older than `before`. Returns the count.
    async fn delete_processed_before(&self, before: Timestamp) -> Result<u64, DomainError>;
}
