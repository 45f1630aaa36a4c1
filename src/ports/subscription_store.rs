//! Subscription store port.
//!
//! Persists Subscription aggregates. Compare-and-swap is the only mutation
//! the lifecycle path uses; `insert` exists for record creation.
//!
//! # Design
//!
//! - **Atomic conditional write**: `compare_and_swap` succeeds only if the
//!   stored record still matches the caller's [`Precondition`]
//! - **No locks**: concurrent writers are serialized by the store alone
//! - **Unique constraints**: one record per subscriber and per provider
//!   subscription ID

use crate::domain::foundation::{DomainError, SubscriberId, SubscriptionId, Timestamp};
use crate::domain::subscription::{
    Precondition, Subscription, SubscriptionLocator, SubscriptionStatus, Trigger,
};
use async_trait::async_trait;

/// Outcome of a compare-and-swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The write landed.
    Applied,
    /// The stored record no longer matches the precondition.
    Conflict,
}

/// Elapsed-time conditions the state-changing sweeps scan for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueCondition {
    /// Trialing with `trial_end <= now`.
    TrialWindow,
    /// PastDue with `dunning_next_retry_at <= now`.
    DunningRetry,
    /// Paused with `pause_resumes_at <= now`.
    PauseWindow,
}

impl DueCondition {
    pub fn status(&self) -> SubscriptionStatus {
        match self {
            DueCondition::TrialWindow => SubscriptionStatus::Trialing,
            DueCondition::DunningRetry => SubscriptionStatus::PastDue,
            DueCondition::PauseWindow => SubscriptionStatus::Paused,
        }
    }

    /// The trigger fed to the engine for a matching record.
    pub fn trigger(&self) -> Trigger {
        match self {
            DueCondition::TrialWindow => Trigger::TrialWindowElapsed,
            DueCondition::DunningRetry => Trigger::DunningRetryDue,
            DueCondition::PauseWindow => Trigger::PauseWindowElapsed,
        }
    }

    /// The timestamp the condition compares against `now`.
    pub fn due_at(&self, subscription: &Subscription) -> Option<Timestamp> {
        match self {
            DueCondition::TrialWindow => subscription.trial_end,
            DueCondition::DunningRetry => subscription.dunning_next_retry_at,
            DueCondition::PauseWindow => subscription.pause_resumes_at,
        }
    }

    pub fn matches(&self, subscription: &Subscription, now: Timestamp) -> bool {
        subscription.status == self.status()
            && self.due_at(subscription).map_or(false, |at| at <= now)
    }
}

/// Selections for the notification-only sweeps. Bounds are `(from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutreachQuery {
    /// Trialing records whose `trial_end` falls in the window.
    TrialEndingBetween { from: Timestamp, to: Timestamp },

    /// Active or Trialing records created in the window.
    CreatedBetween { from: Timestamp, to: Timestamp },

    /// Canceled records canceled in the window, and TrialExpired records
    /// whose trial ended in it.
    LapsedBetween { from: Timestamp, to: Timestamp },
}

impl OutreachQuery {
    pub fn matches(&self, subscription: &Subscription) -> bool {
        let within = |at: Option<Timestamp>, from: Timestamp, to: Timestamp| {
            at.map_or(false, |at| at > from && at <= to)
        };

        match *self {
            OutreachQuery::TrialEndingBetween { from, to } => {
                subscription.status == SubscriptionStatus::Trialing
                    && within(subscription.trial_end, from, to)
            }
            OutreachQuery::CreatedBetween { from, to } => {
                subscription.status.grants_access()
                    && within(Some(subscription.created_at), from, to)
            }
            OutreachQuery::LapsedBetween { from, to } => match subscription.status {
                SubscriptionStatus::Canceled => within(subscription.canceled_at, from, to),
                SubscriptionStatus::TrialExpired => within(subscription.trial_end, from, to),
                _ => false,
            },
        }
    }
}

/// Store port for Subscription aggregates.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// - `SubscriptionExists` if the subscriber or provider subscription ID
    ///   already has a record
    /// - `DatabaseError` on persistence failure
    async fn insert(&self, subscription: &Subscription) -> Result<(), DomainError>;

    async fn load(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError>;

    async fn load_by_subscriber_id(
        &self,
        subscriber_id: &SubscriberId,
    ) -> Result<Option<Subscription>, DomainError>;

    async fn load_by_provider_subscription_id(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError>;

    /// Replace the record with `next` if the stored record matches `expected`.
    async fn compare_and_swap(
        &self,
        expected: Precondition,
        next: &Subscription,
    ) -> Result<CasOutcome, DomainError>;

    /// Records matching `condition` at `now`, oldest due first.
    async fn find_due(
        &self,
        condition: DueCondition,
        now: Timestamp,
        limit: u32,
    ) -> Result<Vec<Subscription>, DomainError>;

    /// Records matching an outreach selection.
    async fn find_for_outreach(
        &self,
        query: OutreachQuery,
        limit: u32,
    ) -> Result<Vec<Subscription>, DomainError>;

    /// Load whichever record `locator` points at.
    async fn load_by(
        &self,
        locator: &SubscriptionLocator,
    ) -> Result<Option<Subscription>, DomainError> {
        match locator {
            SubscriptionLocator::Id(id) => self.load(id).await,
            SubscriptionLocator::Subscriber(subscriber_id) => {
                self.load_by_subscriber_id(subscriber_id).await
            }
            SubscriptionLocator::ProviderSubscription(id) => {
                self.load_by_provider_subscription_id(id).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscription::BillingPeriod;

    fn trial(now: Timestamp) -> Subscription {
        Subscription::start_trial(
            SubscriberId::new("user-1").unwrap(),
            "pro",
            BillingPeriod::Monthly,
            7,
            now,
        )
    }

    #[test]
    fn subscription_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn SubscriptionStore) {}
    }

    #[test]
    fn trial_window_matches_only_when_elapsed() {
        let now = Timestamp::now();
        let sub = trial(now);

        assert!(!DueCondition::TrialWindow.matches(&sub, now.add_days(6)));
        assert!(DueCondition::TrialWindow.matches(&sub, now.add_days(7)));
        assert!(!DueCondition::PauseWindow.matches(&sub, now.add_days(60)));
    }

    #[test]
    fn due_conditions_map_to_time_triggers() {
        for condition in [
            DueCondition::TrialWindow,
            DueCondition::DunningRetry,
            DueCondition::PauseWindow,
        ] {
            assert!(condition.trigger().is_time_based());
        }
    }

    #[test]
    fn trial_ending_window_is_half_open() {
        let now = Timestamp::now();
        let sub = trial(now);
        let end = now.add_days(7);

        assert!(OutreachQuery::TrialEndingBetween {
            from: end.minus_days(1),
            to: end
        }
        .matches(&sub));
        assert!(!OutreachQuery::TrialEndingBetween {
            from: end,
            to: end.add_days(1)
        }
        .matches(&sub));
    }

    #[test]
    fn lapsed_uses_trial_end_for_expired_trials() {
        let now = Timestamp::now();
        let mut sub = trial(now);
        sub.status = SubscriptionStatus::TrialExpired;

        let query = OutreachQuery::LapsedBetween {
            from: now,
            to: now.add_days(8),
        };
        assert!(query.matches(&sub));
    }
}
