//! LifecycleService - The single apply path for every trigger.
//!
//! Load, decide, compare-and-swap, dispatch. Webhooks, subscriber actions
//! and sweeps all come through here, so the store's conditional write is the
//! only concurrency control. On `Conflict` the record is reloaded and the
//! decision repeated, up to `max_attempts`.

use std::sync::Arc;

use crate::domain::foundation::{ErrorCode, Timestamp};
use crate::domain::subscription::{
    transition, Decision, LifecycleError, Rejection, SideEffect, Subscription,
    SubscriptionLocator, SubscriptionStatus, Trigger,
};
use crate::ports::{CasOutcome, SubscriptionStore};

use super::side_effect_dispatcher::SideEffectDispatcher;

/// What applying a trigger did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The write landed and side effects were dispatched.
    Applied {
        from: SubscriptionStatus,
        subscription: Subscription,
    },

    /// Legal trigger, nothing to write.
    Unchanged(Subscription),

    /// The engine refused the trigger.
    Rejected(Rejection),
}

impl ApplyOutcome {
    /// The record after the attempt, if one is known.
    pub fn subscription(&self) -> Option<&Subscription> {
        match self {
            ApplyOutcome::Applied { subscription, .. } | ApplyOutcome::Unchanged(subscription) => {
                Some(subscription)
            }
            ApplyOutcome::Rejected(_) => None,
        }
    }
}

pub struct LifecycleService {
    store: Arc<dyn SubscriptionStore>,
    dispatcher: Arc<SideEffectDispatcher>,
    max_attempts: u32,
}

impl LifecycleService {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        dispatcher: Arc<SideEffectDispatcher>,
        max_attempts: u32,
    ) -> Self {
        Self {
            store,
            dispatcher,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn store(&self) -> &Arc<dyn SubscriptionStore> {
        &self.store
    }

    /// Load the record `locator` points at and apply `trigger` to it.
    pub async fn apply(
        &self,
        locator: &SubscriptionLocator,
        trigger: &Trigger,
        now: Timestamp,
    ) -> Result<ApplyOutcome, LifecycleError> {
        let current = self
            .store
            .load_by(locator)
            .await?
            .ok_or_else(|| LifecycleError::not_found(locator.clone()))?;

        self.apply_to(current, trigger, now).await
    }

    /// Apply `trigger` starting from an already loaded record.
    pub async fn apply_to(
        &self,
        mut current: Subscription,
        trigger: &Trigger,
        now: Timestamp,
    ) -> Result<ApplyOutcome, LifecycleError> {
        for attempt in 1..=self.max_attempts {
            let change = match transition(&current, trigger, now) {
                Ok(Decision::Apply(change)) => change,
                Ok(Decision::Unchanged) => {
                    tracing::debug!(
                        subscription_id = %current.id,
                        status = %current.status,
                        trigger = trigger.name(),
                        "Trigger left subscription unchanged"
                    );
                    return Ok(ApplyOutcome::Unchanged(current));
                }
                Err(rejection) => {
                    log_rejection(&current, &rejection);
                    return Ok(ApplyOutcome::Rejected(rejection));
                }
            };

            match self
                .store
                .compare_and_swap(current.precondition(), &change.next)
                .await?
            {
                CasOutcome::Applied => {
                    tracing::info!(
                        subscription_id = %change.next.id,
                        from = %change.from,
                        to = %change.to(),
                        trigger = trigger.name(),
                        "Subscription transitioned"
                    );
                    self.dispatcher.dispatch(&change.next, &change.effects).await;
                    return Ok(ApplyOutcome::Applied {
                        from: change.from,
                        subscription: change.next,
                    });
                }
                CasOutcome::Conflict => {
                    tracing::debug!(
                        subscription_id = %current.id,
                        attempt,
                        trigger = trigger.name(),
                        "Compare-and-swap conflict, reloading"
                    );
                    let locator = SubscriptionLocator::Id(current.id);
                    current = self
                        .store
                        .load(&current.id)
                        .await?
                        .ok_or_else(|| LifecycleError::not_found(locator))?;
                }
            }
        }

        tracing::warn!(
            subscription_id = %current.id,
            attempts = self.max_attempts,
            trigger = trigger.name(),
            "Giving up after repeated compare-and-swap conflicts"
        );
        Err(LifecycleError::Conflict {
            attempts: self.max_attempts,
        })
    }

    /// Insert a new record and run its creation effects.
    pub async fn create(
        &self,
        subscription: Subscription,
        effects: &[SideEffect],
    ) -> Result<Subscription, LifecycleError> {
        self.store.insert(&subscription).await.map_err(|e| {
            if e.code == ErrorCode::SubscriptionExists {
                LifecycleError::AlreadyExists(subscription.subscriber_id.to_string())
            } else {
                LifecycleError::from(e)
            }
        })?;

        tracing::info!(
            subscription_id = %subscription.id,
            subscriber_id = %subscription.subscriber_id,
            status = %subscription.status,
            "Subscription created"
        );
        self.dispatcher.dispatch(&subscription, effects).await;
        Ok(subscription)
    }
}

fn log_rejection(current: &Subscription, rejection: &Rejection) {
    if rejection.is_drift() {
        tracing::warn!(
            subscription_id = %current.id,
            status = %current.status,
            rejection = %rejection,
            "Trigger rejected; possible drift from provider"
        );
    } else {
        tracing::debug!(
            subscription_id = %current.id,
            status = %current.status,
            rejection = %rejection,
            "Stale time trigger ignored"
        );
    }
}
