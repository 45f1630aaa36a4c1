//! State transition engine.
//!
//! Pure decision logic: given the current record, a trigger and the current
//! time, produce the next record and the ordered side effects to run once the
//! write has committed. Nothing here performs I/O.

use crate::domain::foundation::{StateMachine, Timestamp};
use thiserror::Error;

use super::dunning::{is_exhausted, next_retry_delay};
use super::{
    CheckoutDetails, NotificationTemplate, ProviderSnapshot, ProviderStatus, SideEffect,
    Subscription, SubscriptionStatus, Trigger,
};

/// Length of a subscriber-initiated pause.
pub const PAUSE_DAYS: i64 = 30;

/// Outcome of a legal trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Write `next` and then run `effects`.
    Apply(Transition),

    /// The trigger is legal here but there is nothing to write.
    Unchanged,
}

/// A status write plus the side effects that follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: SubscriptionStatus,
    pub next: Subscription,
    pub effects: Vec<SideEffect>,
}

impl Transition {
    pub fn to(&self) -> SubscriptionStatus {
        self.next.status
    }
}

/// Why a trigger was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// No rule for this trigger in this status. Indicates drift between this
    /// system and the provider, or an ineligible subscriber action.
    #[error("no transition for {trigger} while {status}")]
    NoRule {
        status: SubscriptionStatus,
        trigger: &'static str,
    },

    /// A time trigger whose condition no longer holds; another writer got
    /// there first.
    #[error("{trigger} is not due while {status}")]
    Stale {
        status: SubscriptionStatus,
        trigger: &'static str,
    },
}

impl Rejection {
    /// Returns true if the rejection signals drift worth alerting on.
    pub fn is_drift(&self) -> bool {
        matches!(self, Rejection::NoRule { .. })
    }
}

/// Decide what `trigger` does to `current` at `now`.
pub fn transition(
    current: &Subscription,
    trigger: &Trigger,
    now: Timestamp,
) -> Result<Decision, Rejection> {
    use SubscriptionStatus::*;

    let no_rule = || Rejection::NoRule {
        status: current.status,
        trigger: trigger.name(),
    };
    let stale = || Rejection::Stale {
        status: current.status,
        trigger: trigger.name(),
    };

    let decision = match (current.status, trigger) {
        // Trial
        (Trialing, Trigger::CheckoutCompleted(details)) => {
            convert_trial(current, Some(details), None, now)
        }
        (Trialing, Trigger::PaymentSucceeded { period_end }) => {
            if current.provider_subscription_id.is_none() || current.provider_customer_id.is_none()
            {
                return Err(no_rule());
            }
            convert_trial(current, None, *period_end, now)
        }
        (Trialing, Trigger::TrialWindowElapsed) => {
            if !is_due(current.trial_end, now) {
                return Err(stale());
            }
            expire_trial(current, now)
        }
        (Trialing, Trigger::ManualCancelRequested { .. }) => cancel_now(current, now),

        // Resubscribe
        (TrialExpired | Canceled, Trigger::CheckoutCompleted(details)) => {
            resubscribe(current, details, now)
        }

        // Billing
        (Active, Trigger::PaymentSucceeded { period_end }) => renew(current, *period_end, now),
        (Active, Trigger::PaymentFailed) => enter_dunning(current, now),
        (PastDue, Trigger::PaymentFailed) => Decision::Unchanged,
        (PastDue, Trigger::PaymentSucceeded { period_end }) => recover(current, *period_end, now),
        (PastDue, Trigger::DunningRetryDue) => {
            if !is_due(current.dunning_next_retry_at, now) {
                return Err(stale());
            }
            if is_exhausted(current.dunning_count) {
                suspend(current, now)
            } else {
                retry_dunning(current, now)
            }
        }

        // Provider cancellation
        (Active | PastDue | Suspended | Trialing | Paused, Trigger::ProviderCanceled) => {
            cancel_by_provider(current, now)
        }
        (Canceled, Trigger::ProviderCanceled) => Decision::Unchanged,
        (_, Trigger::ProviderUpdated(snapshot)) => return reconcile(current, snapshot, now),

        // Subscriber actions
        (Active, Trigger::ManualPauseRequested) => pause(current, now),
        (Paused, Trigger::ManualResumeRequested) => resume(current, now),
        (Paused, Trigger::PauseWindowElapsed) => {
            if !is_due(current.pause_resumes_at, now) {
                return Err(stale());
            }
            resume(current, now)
        }
        (Active, Trigger::ManualCancelRequested { immediate: false }) => {
            if current.cancel_at_period_end {
                Decision::Unchanged
            } else {
                schedule_cancel(current, now)
            }
        }
        (Active, Trigger::ManualCancelRequested { immediate: true }) => cancel_now(current, now),

        (_, t) if t.is_time_based() => return Err(stale()),
        _ => return Err(no_rule()),
    };

    Ok(decision)
}

fn is_due(at: Option<Timestamp>, now: Timestamp) -> bool {
    at.map_or(false, |at| at <= now)
}

/// Copy of `current` stamped as the next version.
fn advance(current: &Subscription, now: Timestamp) -> Subscription {
    let mut next = current.clone();
    next.version += 1;
    next.updated_at = now;
    next
}

fn apply(current: &Subscription, next: Subscription, effects: Vec<SideEffect>) -> Decision {
    debug_assert!(
        current.status.can_transition_to(&next.status),
        "engine produced {:?} -> {:?}",
        current.status,
        next.status
    );
    Decision::Apply(Transition {
        from: current.status,
        next,
        effects,
    })
}

fn clear_dunning(next: &mut Subscription) {
    next.dunning_count = 0;
    next.dunning_next_retry_at = None;
}

fn clear_pause(next: &mut Subscription) {
    next.paused_at = None;
    next.pause_resumes_at = None;
}

fn convert_trial(
    current: &Subscription,
    checkout: Option<&CheckoutDetails>,
    period_end: Option<Timestamp>,
    now: Timestamp,
) -> Decision {
    let mut next = advance(current, now);
    next.status = SubscriptionStatus::Active;
    next.is_trial = false;
    next.trial_converted_at = current.trial_converted_at.or(Some(now));

    let (start, end) = match checkout {
        Some(details) => {
            next.provider_subscription_id = Some(details.provider_subscription_id.clone());
            next.provider_customer_id = Some(details.provider_customer_id.clone());
            (details.period_start, details.period_end)
        }
        None => (None, period_end),
    };
    let start = start.unwrap_or(now);
    next.current_period_start = Some(start);
    next.current_period_end =
        Some(end.unwrap_or_else(|| start.add_days(current.billing_period.length_days())));

    apply(current, next, vec![SideEffect::ActivateAccess])
}

fn expire_trial(current: &Subscription, now: Timestamp) -> Decision {
    let mut next = advance(current, now);
    next.status = SubscriptionStatus::TrialExpired;

    apply(
        current,
        next,
        vec![
            SideEffect::SuspendAccess,
            SideEffect::Notify(NotificationTemplate::TrialEnded),
        ],
    )
}

fn resubscribe(current: &Subscription, details: &CheckoutDetails, now: Timestamp) -> Decision {
    let mut next = advance(current, now);
    next.status = SubscriptionStatus::Active;
    next.is_trial = false;
    next.canceled_at = None;
    next.cancel_at_period_end = false;
    clear_dunning(&mut next);
    clear_pause(&mut next);
    next.provider_subscription_id = Some(details.provider_subscription_id.clone());
    next.provider_customer_id = Some(details.provider_customer_id.clone());

    let start = details.period_start.unwrap_or(now);
    next.current_period_start = Some(start);
    next.current_period_end = Some(
        details
            .period_end
            .unwrap_or_else(|| start.add_days(current.billing_period.length_days())),
    );

    apply(
        current,
        next,
        vec![
            SideEffect::ActivateAccess,
            SideEffect::Notify(NotificationTemplate::WelcomeBack),
        ],
    )
}

fn renew(current: &Subscription, period_end: Option<Timestamp>, now: Timestamp) -> Decision {
    let period_end = match period_end {
        Some(end) if Some(end) != current.current_period_end => end,
        _ => return Decision::Unchanged,
    };

    let mut next = advance(current, now);
    next.current_period_start = Some(current.current_period_end.unwrap_or(now));
    next.current_period_end = Some(period_end);

    apply(current, next, Vec::new())
}

fn enter_dunning(current: &Subscription, now: Timestamp) -> Decision {
    let mut next = advance(current, now);
    next.status = SubscriptionStatus::PastDue;
    next.dunning_count = 1;
    next.dunning_next_retry_at = Some(now.plus(next_retry_delay(1)));

    apply(
        current,
        next,
        vec![
            SideEffect::SuspendAccess,
            SideEffect::Notify(NotificationTemplate::DunningNotice { attempt: 1 }),
        ],
    )
}

fn retry_dunning(current: &Subscription, now: Timestamp) -> Decision {
    let attempt = current.dunning_count + 1;

    let mut next = advance(current, now);
    next.dunning_count = attempt;
    next.dunning_next_retry_at = Some(now.plus(next_retry_delay(u32::from(attempt))));

    apply(
        current,
        next,
        vec![
            SideEffect::ProviderRetryInvoice,
            SideEffect::Notify(NotificationTemplate::DunningNotice { attempt }),
        ],
    )
}

fn suspend(current: &Subscription, now: Timestamp) -> Decision {
    let mut next = advance(current, now);
    next.status = SubscriptionStatus::Suspended;
    next.dunning_next_retry_at = None;

    apply(
        current,
        next,
        vec![
            SideEffect::SuspendAccess,
            SideEffect::ProviderCancel {
                at_period_end: false,
            },
            SideEffect::Notify(NotificationTemplate::FinalNotice),
        ],
    )
}

fn recover(current: &Subscription, period_end: Option<Timestamp>, now: Timestamp) -> Decision {
    let mut next = advance(current, now);
    next.status = SubscriptionStatus::Active;
    clear_dunning(&mut next);
    if let Some(end) = period_end {
        next.current_period_end = Some(end);
    }

    apply(current, next, vec![SideEffect::ActivateAccess])
}

fn cancel_by_provider(current: &Subscription, now: Timestamp) -> Decision {
    let mut next = advance(current, now);
    next.status = SubscriptionStatus::Canceled;
    next.canceled_at = Some(now);
    next.cancel_at_period_end = false;
    clear_dunning(&mut next);
    clear_pause(&mut next);

    apply(current, next, vec![SideEffect::RevokeAccess])
}

fn cancel_now(current: &Subscription, now: Timestamp) -> Decision {
    let mut next = advance(current, now);
    next.status = SubscriptionStatus::Canceled;
    next.canceled_at = Some(now);
    next.cancel_at_period_end = false;
    clear_dunning(&mut next);
    clear_pause(&mut next);

    let mut effects = vec![SideEffect::RevokeAccess];
    if current.provider_subscription_id.is_some() {
        effects.push(SideEffect::ProviderCancel {
            at_period_end: false,
        });
    }

    apply(current, next, effects)
}

fn schedule_cancel(current: &Subscription, now: Timestamp) -> Decision {
    let mut next = advance(current, now);
    next.cancel_at_period_end = true;

    apply(
        current,
        next,
        vec![SideEffect::ProviderCancel {
            at_period_end: true,
        }],
    )
}

fn pause(current: &Subscription, now: Timestamp) -> Decision {
    let mut next = advance(current, now);
    next.status = SubscriptionStatus::Paused;
    next.paused_at = Some(now);
    next.pause_resumes_at = Some(now.add_days(PAUSE_DAYS));

    apply(
        current,
        next,
        vec![SideEffect::SuspendAccess, SideEffect::ProviderPauseCollection],
    )
}

fn resume(current: &Subscription, now: Timestamp) -> Decision {
    let mut next = advance(current, now);
    next.status = SubscriptionStatus::Active;
    clear_pause(&mut next);

    apply(
        current,
        next,
        vec![
            SideEffect::ActivateAccess,
            SideEffect::ProviderResumeCollection,
        ],
    )
}

/// Reconcile a provider-side update against the local status.
fn reconcile(
    current: &Subscription,
    snapshot: &ProviderSnapshot,
    now: Timestamp,
) -> Result<Decision, Rejection> {
    use ProviderStatus as P;
    use SubscriptionStatus::*;

    let drift = || Rejection::NoRule {
        status: current.status,
        trigger: "provider_updated",
    };

    match (current.status, snapshot.status) {
        (_, P::Canceled) => {
            transition(current, &Trigger::ProviderCanceled, now).map_err(|_| drift())
        }
        (Active, P::Active) => Ok(sync_from_provider(current, snapshot, now)),
        (Trialing, P::Trialing | P::Active)
        | (PastDue, P::Active | P::PastDue | P::Unpaid)
        | (Paused, P::Paused | P::Active)
        | (Active | Suspended, P::PastDue | P::Unpaid) => Ok(Decision::Unchanged),
        _ => Err(drift()),
    }
}

fn sync_from_provider(current: &Subscription, snapshot: &ProviderSnapshot, now: Timestamp) -> Decision {
    let period_end = snapshot.current_period_end.or(current.current_period_end);
    let cancel_at_period_end = snapshot
        .cancel_at_period_end
        .unwrap_or(current.cancel_at_period_end);

    if period_end == current.current_period_end
        && cancel_at_period_end == current.cancel_at_period_end
    {
        return Decision::Unchanged;
    }

    let mut next = advance(current, now);
    next.current_period_end = period_end;
    next.cancel_at_period_end = cancel_at_period_end;

    apply(current, next, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::SubscriberId;
    use crate::domain::subscription::BillingPeriod;
    use proptest::prelude::*;

    fn subscriber() -> SubscriberId {
        SubscriberId::new("subscriber-1").unwrap()
    }

    fn checkout_details() -> CheckoutDetails {
        CheckoutDetails {
            provider_subscription_id: "sub_123".to_string(),
            provider_customer_id: "cus_123".to_string(),
            period_start: None,
            period_end: None,
        }
    }

    fn trialing(now: Timestamp) -> Subscription {
        Subscription::start_trial(subscriber(), "pro", BillingPeriod::Monthly, 7, now)
    }

    fn active(now: Timestamp) -> Subscription {
        Subscription::from_checkout(
            subscriber(),
            "pro",
            BillingPeriod::Monthly,
            &checkout_details(),
            now,
        )
    }

    fn applied(decision: Result<Decision, Rejection>) -> Transition {
        match decision {
            Ok(Decision::Apply(t)) => t,
            other => panic!("expected Apply, got {:?}", other),
        }
    }

    fn past_due(now: Timestamp) -> Subscription {
        applied(transition(&active(now), &Trigger::PaymentFailed, now)).next
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Trial
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn checkout_converts_trial() {
        let now = Timestamp::now();
        let t = applied(transition(
            &trialing(now),
            &Trigger::CheckoutCompleted(checkout_details()),
            now,
        ));

        assert_eq!(t.to(), SubscriptionStatus::Active);
        assert!(!t.next.is_trial);
        assert_eq!(t.next.trial_converted_at, Some(now));
        assert_eq!(t.next.provider_subscription_id.as_deref(), Some("sub_123"));
        assert_eq!(t.effects, vec![SideEffect::ActivateAccess]);
    }

    #[test]
    fn trial_converted_at_is_never_overwritten() {
        let now = Timestamp::now();
        let mut sub = trialing(now);
        let earlier = now.minus_days(2);
        sub.trial_converted_at = Some(earlier);

        let t = applied(transition(
            &sub,
            &Trigger::CheckoutCompleted(checkout_details()),
            now,
        ));
        assert_eq!(t.next.trial_converted_at, Some(earlier));
    }

    #[test]
    fn payment_without_provider_ids_cannot_convert_trial() {
        let now = Timestamp::now();
        let result = transition(
            &trialing(now),
            &Trigger::PaymentSucceeded { period_end: None },
            now,
        );
        assert!(matches!(result, Err(Rejection::NoRule { .. })));
    }

    #[test]
    fn trial_expires_once_window_elapsed() {
        let now = Timestamp::now();
        let sub = trialing(now);

        let t = applied(transition(&sub, &Trigger::TrialWindowElapsed, now.add_days(8)));

        assert_eq!(t.to(), SubscriptionStatus::TrialExpired);
        assert_eq!(
            t.effects,
            vec![
                SideEffect::SuspendAccess,
                SideEffect::Notify(NotificationTemplate::TrialEnded)
            ]
        );
    }

    #[test]
    fn trial_window_not_due_is_stale() {
        let now = Timestamp::now();
        let result = transition(&trialing(now), &Trigger::TrialWindowElapsed, now.add_days(1));
        assert!(matches!(result, Err(Rejection::Stale { .. })));
    }

    #[test]
    fn trial_window_on_expired_record_is_stale_not_drift() {
        let now = Timestamp::now();
        let expired = applied(transition(
            &trialing(now),
            &Trigger::TrialWindowElapsed,
            now.add_days(8),
        ))
        .next;

        let err = transition(&expired, &Trigger::TrialWindowElapsed, now.add_days(8)).unwrap_err();
        assert!(!err.is_drift());
    }

    #[test]
    fn trial_cancel_without_provider_skips_provider_call() {
        let now = Timestamp::now();
        let t = applied(transition(
            &trialing(now),
            &Trigger::ManualCancelRequested { immediate: false },
            now,
        ));

        assert_eq!(t.to(), SubscriptionStatus::Canceled);
        assert_eq!(t.effects, vec![SideEffect::RevokeAccess]);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Dunning
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn payment_failure_enters_dunning() {
        let now = Timestamp::now();
        let t = applied(transition(&active(now), &Trigger::PaymentFailed, now));

        assert_eq!(t.to(), SubscriptionStatus::PastDue);
        assert_eq!(t.next.dunning_count, 1);
        assert_eq!(t.next.dunning_next_retry_at, Some(now.add_days(3)));
        assert_eq!(
            t.effects,
            vec![
                SideEffect::SuspendAccess,
                SideEffect::Notify(NotificationTemplate::DunningNotice { attempt: 1 })
            ]
        );
    }

    #[test]
    fn repeated_payment_failure_is_unchanged() {
        let now = Timestamp::now();
        let result = transition(&past_due(now), &Trigger::PaymentFailed, now);
        assert_eq!(result, Ok(Decision::Unchanged));
    }

    #[test]
    fn dunning_retries_then_suspends() {
        let start = Timestamp::now();
        let mut sub = past_due(start);

        let at = start.add_days(3);
        let t = applied(transition(&sub, &Trigger::DunningRetryDue, at));
        assert_eq!(t.next.dunning_count, 2);
        assert_eq!(t.next.dunning_next_retry_at, Some(at.add_days(7)));
        assert_eq!(
            t.effects,
            vec![
                SideEffect::ProviderRetryInvoice,
                SideEffect::Notify(NotificationTemplate::DunningNotice { attempt: 2 })
            ]
        );
        sub = t.next;

        let at = at.add_days(7);
        let t = applied(transition(&sub, &Trigger::DunningRetryDue, at));
        assert_eq!(t.next.dunning_count, 3);
        assert_eq!(t.next.dunning_next_retry_at, Some(at.add_days(14)));
        sub = t.next;

        let at = at.add_days(14);
        let t = applied(transition(&sub, &Trigger::DunningRetryDue, at));
        assert_eq!(t.to(), SubscriptionStatus::Suspended);
        assert_eq!(t.next.dunning_count, 3);
        assert_eq!(t.next.dunning_next_retry_at, None);
        assert_eq!(
            t.effects,
            vec![
                SideEffect::SuspendAccess,
                SideEffect::ProviderCancel {
                    at_period_end: false
                },
                SideEffect::Notify(NotificationTemplate::FinalNotice)
            ]
        );
    }

    #[test]
    fn dunning_retry_before_due_is_stale() {
        let now = Timestamp::now();
        let result = transition(&past_due(now), &Trigger::DunningRetryDue, now.add_days(1));
        assert!(matches!(result, Err(Rejection::Stale { .. })));
    }

    #[test]
    fn payment_success_recovers_from_past_due() {
        let now = Timestamp::now();
        let t = applied(transition(
            &past_due(now),
            &Trigger::PaymentSucceeded { period_end: None },
            now,
        ));

        assert_eq!(t.to(), SubscriptionStatus::Active);
        assert_eq!(t.next.dunning_count, 0);
        assert_eq!(t.next.dunning_next_retry_at, None);
        assert_eq!(t.effects, vec![SideEffect::ActivateAccess]);
    }

    #[test]
    fn payment_success_rejected_while_suspended_or_canceled() {
        let now = Timestamp::now();
        let mut suspended = past_due(now);
        suspended.status = SubscriptionStatus::Suspended;
        suspended.dunning_count = 3;
        suspended.dunning_next_retry_at = None;

        let canceled = applied(transition(&active(now), &Trigger::ProviderCanceled, now)).next;

        for sub in [suspended, canceled] {
            let result = transition(&sub, &Trigger::PaymentSucceeded { period_end: None }, now);
            assert!(matches!(result, Err(Rejection::NoRule { .. })), "{:?}", sub.status);
        }
    }

    #[test]
    fn renewal_advances_period() {
        let now = Timestamp::now();
        let sub = active(now);
        let new_end = now.add_days(60);

        let t = applied(transition(
            &sub,
            &Trigger::PaymentSucceeded {
                period_end: Some(new_end),
            },
            now,
        ));

        assert_eq!(t.to(), SubscriptionStatus::Active);
        assert_eq!(t.next.current_period_start, sub.current_period_end);
        assert_eq!(t.next.current_period_end, Some(new_end));
        assert!(t.effects.is_empty());
    }

    #[test]
    fn renewal_without_period_is_unchanged() {
        let now = Timestamp::now();
        let result = transition(&active(now), &Trigger::PaymentSucceeded { period_end: None }, now);
        assert_eq!(result, Ok(Decision::Unchanged));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Cancellation
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn provider_cancel_revokes_and_resets_dunning() {
        let now = Timestamp::now();
        let t = applied(transition(&past_due(now), &Trigger::ProviderCanceled, now));

        assert_eq!(t.to(), SubscriptionStatus::Canceled);
        assert_eq!(t.next.canceled_at, Some(now));
        assert_eq!(t.next.dunning_count, 0);
        assert_eq!(t.effects, vec![SideEffect::RevokeAccess]);
    }

    #[test]
    fn provider_cancel_echo_is_unchanged() {
        let now = Timestamp::now();
        let canceled = applied(transition(&active(now), &Trigger::ProviderCanceled, now)).next;
        assert_eq!(
            transition(&canceled, &Trigger::ProviderCanceled, now),
            Ok(Decision::Unchanged)
        );
    }

    #[test]
    fn scheduled_cancel_keeps_active() {
        let now = Timestamp::now();
        let t = applied(transition(
            &active(now),
            &Trigger::ManualCancelRequested { immediate: false },
            now,
        ));

        assert_eq!(t.to(), SubscriptionStatus::Active);
        assert!(t.next.cancel_at_period_end);
        assert_eq!(
            t.effects,
            vec![SideEffect::ProviderCancel {
                at_period_end: true
            }]
        );

        let again = transition(&t.next, &Trigger::ManualCancelRequested { immediate: false }, now);
        assert_eq!(again, Ok(Decision::Unchanged));
    }

    #[test]
    fn immediate_cancel_revokes_and_cancels_provider() {
        let now = Timestamp::now();
        let t = applied(transition(
            &active(now),
            &Trigger::ManualCancelRequested { immediate: true },
            now,
        ));

        assert_eq!(t.to(), SubscriptionStatus::Canceled);
        assert_eq!(
            t.effects,
            vec![
                SideEffect::RevokeAccess,
                SideEffect::ProviderCancel {
                    at_period_end: false
                }
            ]
        );
    }

    #[test]
    fn resubscribe_after_cancel_clears_canceled_at() {
        let now = Timestamp::now();
        let canceled = applied(transition(&active(now), &Trigger::ProviderCanceled, now)).next;
        let later = now.add_days(10);

        let t = applied(transition(
            &canceled,
            &Trigger::CheckoutCompleted(checkout_details()),
            later,
        ));

        assert_eq!(t.to(), SubscriptionStatus::Active);
        assert_eq!(t.next.canceled_at, None);
        assert_eq!(
            t.effects,
            vec![
                SideEffect::ActivateAccess,
                SideEffect::Notify(NotificationTemplate::WelcomeBack)
            ]
        );
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Pause
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn pause_and_manual_resume() {
        let now = Timestamp::now();
        let paused = applied(transition(&active(now), &Trigger::ManualPauseRequested, now));

        assert_eq!(paused.to(), SubscriptionStatus::Paused);
        assert_eq!(paused.next.paused_at, Some(now));
        assert_eq!(paused.next.pause_resumes_at, Some(now.add_days(PAUSE_DAYS)));
        assert_eq!(
            paused.effects,
            vec![SideEffect::SuspendAccess, SideEffect::ProviderPauseCollection]
        );

        let resumed = applied(transition(&paused.next, &Trigger::ManualResumeRequested, now));
        assert_eq!(resumed.to(), SubscriptionStatus::Active);
        assert_eq!(resumed.next.paused_at, None);
        assert_eq!(resumed.next.pause_resumes_at, None);
        assert_eq!(
            resumed.effects,
            vec![SideEffect::ActivateAccess, SideEffect::ProviderResumeCollection]
        );
    }

    #[test]
    fn pause_window_resumes_only_when_due() {
        let now = Timestamp::now();
        let paused = applied(transition(&active(now), &Trigger::ManualPauseRequested, now)).next;

        assert!(matches!(
            transition(&paused, &Trigger::PauseWindowElapsed, now.add_days(10)),
            Err(Rejection::Stale { .. })
        ));
        let t = applied(transition(&paused, &Trigger::PauseWindowElapsed, now.add_days(30)));
        assert_eq!(t.to(), SubscriptionStatus::Active);
    }

    #[test]
    fn pause_is_ineligible_while_past_due() {
        let now = Timestamp::now();
        let err = transition(&past_due(now), &Trigger::ManualPauseRequested, now).unwrap_err();
        assert!(err.is_drift());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Provider reconciliation
    // ════════════════════════════════════════════════════════════════════════════

    fn snapshot(status: ProviderStatus) -> ProviderSnapshot {
        ProviderSnapshot {
            status,
            cancel_at_period_end: None,
            current_period_end: None,
        }
    }

    #[test]
    fn provider_update_canceled_acts_as_cancel() {
        let now = Timestamp::now();
        let t = applied(transition(
            &active(now),
            &Trigger::ProviderUpdated(snapshot(ProviderStatus::Canceled)),
            now,
        ));
        assert_eq!(t.to(), SubscriptionStatus::Canceled);
        assert_eq!(t.effects, vec![SideEffect::RevokeAccess]);
    }

    #[test]
    fn provider_update_syncs_cancel_flag() {
        let now = Timestamp::now();
        let mut snap = snapshot(ProviderStatus::Active);
        snap.cancel_at_period_end = Some(true);

        let t = applied(transition(&active(now), &Trigger::ProviderUpdated(snap), now));
        assert!(t.next.cancel_at_period_end);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn provider_update_matching_state_is_unchanged() {
        let now = Timestamp::now();
        assert_eq!(
            transition(
                &active(now),
                &Trigger::ProviderUpdated(snapshot(ProviderStatus::Active)),
                now
            ),
            Ok(Decision::Unchanged)
        );
        assert_eq!(
            transition(
                &past_due(now),
                &Trigger::ProviderUpdated(snapshot(ProviderStatus::PastDue)),
                now
            ),
            Ok(Decision::Unchanged)
        );
    }

    #[test]
    fn provider_update_contradiction_is_drift() {
        let now = Timestamp::now();
        let err = transition(
            &active(now),
            &Trigger::ProviderUpdated(snapshot(ProviderStatus::Trialing)),
            now,
        )
        .unwrap_err();
        assert!(err.is_drift());
    }

    #[test]
    fn every_apply_bumps_version_by_one() {
        let now = Timestamp::now();
        let sub = active(now);
        let t = applied(transition(&sub, &Trigger::PaymentFailed, now));
        assert_eq!(t.next.version, sub.version + 1);
        assert_eq!(t.next.updated_at, now);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Property tests
    // ════════════════════════════════════════════════════════════════════════════

    fn arb_trigger() -> impl Strategy<Value = Trigger> {
        let provider_status = prop_oneof![
            Just(ProviderStatus::Trialing),
            Just(ProviderStatus::Active),
            Just(ProviderStatus::PastDue),
            Just(ProviderStatus::Unpaid),
            Just(ProviderStatus::Paused),
            Just(ProviderStatus::Canceled),
            Just(ProviderStatus::Unknown),
        ];

        prop_oneof![
            Just(Trigger::CheckoutCompleted(checkout_details())),
            prop::option::of(1i64..400).prop_map(|days| Trigger::PaymentSucceeded {
                period_end: days.map(|d| Timestamp::now().add_days(d)),
            }),
            Just(Trigger::PaymentFailed),
            Just(Trigger::ProviderCanceled),
            (provider_status, prop::option::of(any::<bool>())).prop_map(|(status, flag)| {
                Trigger::ProviderUpdated(ProviderSnapshot {
                    status,
                    cancel_at_period_end: flag,
                    current_period_end: None,
                })
            }),
            any::<bool>().prop_map(|immediate| Trigger::ManualCancelRequested { immediate }),
            Just(Trigger::ManualPauseRequested),
            Just(Trigger::ManualResumeRequested),
            Just(Trigger::TrialWindowElapsed),
            Just(Trigger::DunningRetryDue),
            Just(Trigger::PauseWindowElapsed),
        ]
    }

    proptest! {
        #[test]
        fn invariants_hold_over_any_trigger_sequence(
            start_in_trial in any::<bool>(),
            steps in prop::collection::vec((arb_trigger(), 0i64..20), 1..40),
        ) {
            let mut now = Timestamp::now();
            let mut sub = if start_in_trial { trialing(now) } else { active(now) };
            let mut token_active = true;

            for (trigger, days) in steps {
                now = now.add_days(days);
                if let Ok(Decision::Apply(t)) = transition(&sub, &trigger, now) {
                    prop_assert_eq!(t.next.version, sub.version + 1);
                    prop_assert!(
                        sub.status.can_transition_to(&t.next.status),
                        "{:?} -> {:?}", sub.status, t.next.status
                    );

                    for effect in &t.effects {
                        match effect {
                            SideEffect::ActivateAccess => token_active = true,
                            SideEffect::SuspendAccess | SideEffect::RevokeAccess => {
                                token_active = false
                            }
                            _ => {}
                        }
                    }

                    sub = t.next;
                    prop_assert!(
                        sub.invariant_violations().is_empty(),
                        "{:?} after {}", sub.invariant_violations(), trigger.name()
                    );
                    prop_assert_eq!(token_active, sub.grants_access());
                }
            }
        }

        #[test]
        fn rejected_triggers_never_change_anything(
            steps in prop::collection::vec(arb_trigger(), 1..20),
        ) {
            let now = Timestamp::now();
            let sub = active(now);
            for trigger in steps {
                if let Err(rejection) = transition(&sub, &trigger, now) {
                    let expected_name = trigger.name();
                    match rejection {
                        Rejection::NoRule { status, trigger } | Rejection::Stale { status, trigger } => {
                            prop_assert_eq!(status, sub.status);
                            prop_assert_eq!(trigger, expected_name);
                        }
                    }
                }
            }
        }
    }
}
