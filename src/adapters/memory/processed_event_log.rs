//! In-memory ProcessedEventLog with the same lease semantics as Postgres.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{ClaimOutcome, ProcessedEventLog, CLAIM_LEASE_SECS};

#[derive(Debug, Clone)]
struct Entry {
    event_type: String,
    claimed_at: Timestamp,
    processed_at: Option<Timestamp>,
}

#[derive(Default)]
pub struct InMemoryProcessedEventLog {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryProcessedEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_processed(&self, event_id: &str) -> bool {
        self.entries
            .read()
            .await
            .get(event_id)
            .map_or(false, |e| e.processed_at.is_some())
    }

    pub async fn event_type_of(&self, event_id: &str) -> Option<String> {
        self.entries
            .read()
            .await
            .get(event_id)
            .map(|e| e.event_type.clone())
    }

    /// Claim `event_id` as if at `now`. Lets tests age a claim past its lease.
    pub async fn try_claim_at(
        &self,
        event_id: &str,
        event_type: &str,
        now: Timestamp,
    ) -> ClaimOutcome {
        let mut entries = self.entries.write().await;
        let lease = chrono::Duration::seconds(CLAIM_LEASE_SECS);

        if let Some(entry) = entries.get(event_id) {
            if entry.processed_at.is_some() {
                return ClaimOutcome::AlreadyProcessed;
            }
            if entry.claimed_at.plus(lease) > now {
                return ClaimOutcome::InFlight;
            }
        }

        entries.insert(
            event_id.to_string(),
            Entry {
                event_type: event_type.to_string(),
                claimed_at: now,
                processed_at: None,
            },
        );
        ClaimOutcome::Claimed
    }
}

#[async_trait]
impl ProcessedEventLog for InMemoryProcessedEventLog {
    async fn try_claim(
        &self,
        event_id: &str,
        event_type: &str,
    ) -> Result<ClaimOutcome, DomainError> {
        Ok(self.try_claim_at(event_id, event_type, Timestamp::now()).await)
    }

    async fn mark_processed(&self, event_id: &str) -> Result<(), DomainError> {
        if let Some(entry) = self.entries.write().await.get_mut(event_id) {
            entry.processed_at = Some(Timestamp::now());
        }
        Ok(())
    }

    async fn release(&self, event_id: &str) -> Result<(), DomainError> {
        let mut entries = self.entries.write().await;
        if entries
            .get(event_id)
            .map_or(false, |e| e.processed_at.is_none())
        {
            entries.remove(event_id);
        }
        Ok(())
    }

    async fn delete_processed_before(&self, before: Timestamp) -> Result<u64, DomainError> {
        let mut entries = self.entries.write().await;
        let start = entries.len();
        entries.retain(|_, e| e.processed_at.map_or(true, |at| at >= before));
        Ok((start - entries.len()) as u64)
    }
}
