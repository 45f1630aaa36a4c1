//! In-memory SubscriptionStore.
//!
//! Compare-and-swap runs under a single write lock, which gives the same
//! one-winner guarantee as the conditional UPDATE in the Postgres adapter.
//! Subscriber and provider subscription ids are unique across records, on
//! insert and on swap, matching the table's unique keys.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{
    DomainError, ErrorCode, SubscriberId, SubscriptionId, Timestamp,
};
use crate::domain::subscription::{Precondition, Subscription};
use crate::ports::{CasOutcome, DueCondition, OutreachQuery, SubscriptionStore};

#[derive(Default)]
pub struct InMemorySubscriptionStore {
    records: RwLock<HashMap<SubscriptionId, Subscription>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Overwrite a record without any precondition. Test setup only.
    pub async fn put(&self, subscription: Subscription) {
        self.records
            .write()
            .await
            .insert(subscription.id, subscription);
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn insert(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let mut records = self.records.write().await;

        let clashes = records.values().any(|existing| {
            existing.id == subscription.id
                || existing.subscriber_id == subscription.subscriber_id
                || (subscription.provider_subscription_id.is_some()
                    && existing.provider_subscription_id == subscription.provider_subscription_id)
        });
        if clashes {
            return Err(DomainError::new(
                ErrorCode::SubscriptionExists,
                format!(
                    "Subscription already exists for subscriber {}",
                    subscription.subscriber_id
                ),
            ));
        }

        records.insert(subscription.id, subscription.clone());
        Ok(())
    }

    async fn load(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn load_by_subscriber_id(
        &self,
        subscriber_id: &SubscriberId,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|s| &s.subscriber_id == subscriber_id)
            .cloned())
    }

    async fn load_by_provider_subscription_id(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|s| s.provider_subscription_id.as_deref() == Some(provider_subscription_id))
            .cloned())
    }

    async fn compare_and_swap(
        &self,
        expected: Precondition,
        next: &Subscription,
    ) -> Result<CasOutcome, DomainError> {
        let mut records = self.records.write().await;

        let provider_id_taken = next.provider_subscription_id.is_some()
            && records.values().any(|other| {
                other.id != next.id
                    && other.provider_subscription_id == next.provider_subscription_id
            });
        if provider_id_taken {
            return Err(DomainError::new(
                ErrorCode::SubscriptionExists,
                "Provider subscription id is already linked to another subscriber",
            ));
        }

        match records.get_mut(&next.id) {
            Some(current) if current.precondition() == expected => {
                *current = next.clone();
                Ok(CasOutcome::Applied)
            }
            _ => Ok(CasOutcome::Conflict),
        }
    }

    async fn find_due(
        &self,
        condition: DueCondition,
        now: Timestamp,
        limit: u32,
    ) -> Result<Vec<Subscription>, DomainError> {
        let records = self.records.read().await;
        let mut due: Vec<Subscription> = records
            .values()
            .filter(|s| condition.matches(s, now))
            .cloned()
            .collect();
        due.sort_by_key(|s| condition.due_at(s));
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn find_for_outreach(
        &self,
        query: OutreachQuery,
        limit: u32,
    ) -> Result<Vec<Subscription>, DomainError> {
        let records = self.records.read().await;
        let mut found: Vec<Subscription> =
            records.values().filter(|s| query.matches(s)).cloned().collect();
        found.sort_by_key(|s| s.created_at);
        found.truncate(limit as usize);
        Ok(found)
    }
}
