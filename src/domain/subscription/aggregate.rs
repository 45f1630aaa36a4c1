//! Subscription aggregate entity.
//!
//! One record per subscriber. The record is only ever replaced as a whole by
//! a compare-and-swap against the [`Precondition`] it was read with.
//!
//! # Design Decisions
//!
//! - **One per subscriber**: unique constraint on `subscriber_id`
//! - **Versioned**: every write bumps `version`, so self-transitions are
//!   distinguishable from a stale read
//! - **Fail-secure**: no record, no access

use crate::domain::foundation::{SubscriberId, SubscriptionId, Timestamp};
use serde::{Deserialize, Serialize};

use super::{BillingPeriod, CheckoutDetails, SubscriptionStatus};

/// Subscription aggregate.
///
/// # Invariants
///
/// - `dunning_count == 0` unless status is PastDue or Suspended
/// - `paused_at` / `pause_resumes_at` set iff status is Paused
/// - `canceled_at` set iff status is Canceled
/// - `trial_end` set whenever `is_trial`
/// - provider IDs set once Active has been reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub subscriber_id: SubscriberId,
    pub plan_id: String,
    pub billing_period: BillingPeriod,
    pub status: SubscriptionStatus,

    pub is_trial: bool,
    pub trial_start: Option<Timestamp>,
    pub trial_end: Option<Timestamp>,
    /// Set on conversion; never cleared.
    pub trial_converted_at: Option<Timestamp>,

    pub current_period_start: Option<Timestamp>,
    pub current_period_end: Option<Timestamp>,

    /// Failed payment attempts in the current dunning cycle (0-3).
    pub dunning_count: u8,
    pub dunning_next_retry_at: Option<Timestamp>,

    pub paused_at: Option<Timestamp>,
    pub pause_resumes_at: Option<Timestamp>,

    pub cancel_at_period_end: bool,
    pub canceled_at: Option<Timestamp>,

    pub provider_subscription_id: Option<String>,
    pub provider_customer_id: Option<String>,

    /// Optimistic concurrency counter, bumped on every write.
    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// What a writer believes the stored record looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Precondition {
    pub status: SubscriptionStatus,
    pub version: i64,
}

/// Which record an incoming trigger targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionLocator {
    Id(SubscriptionId),
    Subscriber(SubscriberId),
    ProviderSubscription(String),
}

impl std::fmt::Display for SubscriptionLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionLocator::Id(id) => write!(f, "id:{}", id),
            SubscriptionLocator::Subscriber(id) => write!(f, "subscriber:{}", id),
            SubscriptionLocator::ProviderSubscription(id) => write!(f, "provider:{}", id),
        }
    }
}

impl Subscription {
    /// Start a free trial. The record is `Trialing` until `trial_end`.
    pub fn start_trial(
        subscriber_id: SubscriberId,
        plan_id: impl Into<String>,
        billing_period: BillingPeriod,
        trial_days: i64,
        now: Timestamp,
    ) -> Self {
        Self {
            id: SubscriptionId::new(),
            subscriber_id,
            plan_id: plan_id.into(),
            billing_period,
            status: SubscriptionStatus::Trialing,
            is_trial: true,
            trial_start: Some(now),
            trial_end: Some(now.add_days(trial_days)),
            trial_converted_at: None,
            current_period_start: None,
            current_period_end: None,
            dunning_count: 0,
            dunning_next_retry_at: None,
            paused_at: None,
            pause_resumes_at: None,
            cancel_at_period_end: false,
            canceled_at: None,
            provider_subscription_id: None,
            provider_customer_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a paid subscription from a checkout for a subscriber with no
    /// existing record.
    pub fn from_checkout(
        subscriber_id: SubscriberId,
        plan_id: impl Into<String>,
        billing_period: BillingPeriod,
        checkout: &CheckoutDetails,
        now: Timestamp,
    ) -> Self {
        let period_start = checkout.period_start.unwrap_or(now);
        let period_end = checkout
            .period_end
            .unwrap_or_else(|| period_start.add_days(billing_period.length_days()));

        Self {
            id: SubscriptionId::new(),
            subscriber_id,
            plan_id: plan_id.into(),
            billing_period,
            status: SubscriptionStatus::Active,
            is_trial: false,
            trial_start: None,
            trial_end: None,
            trial_converted_at: None,
            current_period_start: Some(period_start),
            current_period_end: Some(period_end),
            dunning_count: 0,
            dunning_next_retry_at: None,
            paused_at: None,
            pause_resumes_at: None,
            cancel_at_period_end: false,
            canceled_at: None,
            provider_subscription_id: Some(checkout.provider_subscription_id.clone()),
            provider_customer_id: Some(checkout.provider_customer_id.clone()),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// The precondition a compare-and-swap against this record must carry.
    pub fn precondition(&self) -> Precondition {
        Precondition {
            status: self.status,
            version: self.version,
        }
    }

    /// Check if this subscription grants access to the application.
    pub fn grants_access(&self) -> bool {
        self.status.grants_access()
    }

    /// Returns the invariants this record currently violates.
    ///
    /// Empty for every record the engine produces.
    pub fn invariant_violations(&self) -> Vec<&'static str> {
        let mut violations = Vec::new();

        if self.dunning_count != 0 && !self.status.allows_dunning() {
            violations.push("dunning_count must be 0 outside PastDue/Suspended");
        }
        if self.dunning_count > super::MAX_DUNNING_ATTEMPTS {
            violations.push("dunning_count exceeds the escalation threshold");
        }
        if self.dunning_next_retry_at.is_some() && self.status != SubscriptionStatus::PastDue {
            violations.push("dunning_next_retry_at set outside PastDue");
        }

        let paused = self.status == SubscriptionStatus::Paused;
        if self.pause_resumes_at.is_some() != paused || self.paused_at.is_some() != paused {
            violations.push("pause fields must be set iff Paused");
        }

        let canceled = self.status == SubscriptionStatus::Canceled;
        if self.canceled_at.is_some() != canceled {
            violations.push("canceled_at must be set iff Canceled");
        }

        if self.is_trial && self.trial_end.is_none() {
            violations.push("trial_end must be set while is_trial");
        }

        if self.status == SubscriptionStatus::Active
            && (self.provider_subscription_id.is_none() || self.provider_customer_id.is_none())
        {
            violations.push("provider IDs must be set once Active");
        }

        violations
    }
}
