//! SideEffectDispatcher - Runs the effects of a committed transition.
//!
//! Effects run in order after the status write. A failing effect is logged
//! at `error!` and never rolls the write back; the remaining effects still
//! run. Provider callbacks are bounded by a timeout.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::subscription::{SideEffect, Subscription};
use crate::ports::{
    AccessTokenService, Notification, Notifier, PaymentError, PaymentProvider, SendOutcome,
};

/// Per-dispatch tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub succeeded: usize,
    pub failed: usize,
}

pub struct SideEffectDispatcher {
    access_tokens: Arc<dyn AccessTokenService>,
    notifier: Arc<dyn Notifier>,
    payment_provider: Arc<dyn PaymentProvider>,
    provider_timeout: Duration,
}

impl SideEffectDispatcher {
    pub fn new(
        access_tokens: Arc<dyn AccessTokenService>,
        notifier: Arc<dyn Notifier>,
        payment_provider: Arc<dyn PaymentProvider>,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            access_tokens,
            notifier,
            payment_provider,
            provider_timeout,
        }
    }

    pub async fn dispatch(
        &self,
        subscription: &Subscription,
        effects: &[SideEffect],
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        for effect in effects {
            match self.run(subscription, effect).await {
                Ok(()) => report.succeeded += 1,
                Err(reason) => {
                    report.failed += 1;
                    tracing::error!(
                        subscription_id = %subscription.id,
                        subscriber_id = %subscription.subscriber_id,
                        status = %subscription.status,
                        effect = effect.name(),
                        error = %reason,
                        "Side effect failed after status change"
                    );
                }
            }
        }

        report
    }

    async fn run(&self, subscription: &Subscription, effect: &SideEffect) -> Result<(), String> {
        let subscriber = &subscription.subscriber_id;

        match effect {
            SideEffect::ActivateAccess => self
                .access_tokens
                .activate(subscriber)
                .await
                .map_err(|e| e.to_string()),
            SideEffect::SuspendAccess => self
                .access_tokens
                .suspend(subscriber)
                .await
                .map_err(|e| e.to_string()),
            SideEffect::RevokeAccess => self
                .access_tokens
                .revoke(subscriber)
                .await
                .map_err(|e| e.to_string()),
            SideEffect::Notify(template) => {
                let notification = Notification::for_subscription(subscription, *template);
                match self.notifier.send(&notification).await {
                    Ok(SendOutcome::Sent) => Ok(()),
                    Ok(SendOutcome::Duplicate) => {
                        tracing::debug!(
                            dedupe_key = %notification.dedupe_key(),
                            "Notification deduplicated"
                        );
                        Ok(())
                    }
                    Err(e) => Err(e.to_string()),
                }
            }
            SideEffect::ProviderCancel { .. }
            | SideEffect::ProviderRetryInvoice
            | SideEffect::ProviderPauseCollection
            | SideEffect::ProviderResumeCollection => {
                self.call_provider(subscription, effect).await
            }
        }
    }

    async fn call_provider(
        &self,
        subscription: &Subscription,
        effect: &SideEffect,
    ) -> Result<(), String> {
        let Some(provider_id) = subscription.provider_subscription_id.as_deref() else {
            tracing::warn!(
                subscription_id = %subscription.id,
                effect = effect.name(),
                "No provider subscription; skipping provider callback"
            );
            return Ok(());
        };

        let provider = &self.payment_provider;
        let call = async {
            match effect {
                SideEffect::ProviderCancel { at_period_end } => {
                    provider.cancel_subscription(provider_id, *at_period_end).await
                }
                SideEffect::ProviderRetryInvoice => provider.retry_invoice(provider_id).await,
                SideEffect::ProviderPauseCollection => provider.pause_collection(provider_id).await,
                SideEffect::ProviderResumeCollection => {
                    provider.resume_collection(provider_id).await
                }
                _ => Ok(()),
            }
        };

        match tokio::time::timeout(self.provider_timeout, call).await {
            Ok(result) => result.map_err(|e: PaymentError| e.to_string()),
            Err(_) => Err(format!(
                "{}: {}",
                effect.name(),
                PaymentError::TimedOut(self.provider_timeout)
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryAccessTokens, TokenState};
    use crate::adapters::notifications::LogNotifier;
    use crate::adapters::stripe::MockPaymentProvider;
    use crate::domain::foundation::{SubscriberId, Timestamp};
    use crate::domain::subscription::{
        BillingPeriod, CheckoutDetails, NotificationTemplate,
    };

    struct Fixture {
        tokens: Arc<InMemoryAccessTokens>,
        notifier: Arc<LogNotifier>,
        provider: Arc<MockPaymentProvider>,
        dispatcher: SideEffectDispatcher,
    }

    fn fixture() -> Fixture {
        let tokens = Arc::new(InMemoryAccessTokens::new());
        let notifier = Arc::new(LogNotifier::new());
        let provider = Arc::new(MockPaymentProvider::new());
        let dispatcher = SideEffectDispatcher::new(
            tokens.clone(),
            notifier.clone(),
            provider.clone(),
            Duration::from_secs(1),
        );
        Fixture {
            tokens,
            notifier,
            provider,
            dispatcher,
        }
    }

    fn paid_subscription() -> Subscription {
        Subscription::from_checkout(
            SubscriberId::new("user-1").unwrap(),
            "pro",
            BillingPeriod::Monthly,
            &CheckoutDetails {
                provider_subscription_id: "sub_1".to_string(),
                provider_customer_id: "cus_1".to_string(),
                period_start: None,
                period_end: None,
            },
            Timestamp::now(),
        )
    }

    #[tokio::test]
    async fn runs_effects_in_order() {
        let f = fixture();
        let sub = paid_subscription();

        let report = f
            .dispatcher
            .dispatch(
                &sub,
                &[
                    SideEffect::SuspendAccess,
                    SideEffect::ProviderPauseCollection,
                    SideEffect::Notify(NotificationTemplate::DunningNotice { attempt: 1 }),
                ],
            )
            .await;

        assert_eq!(report, DispatchReport { succeeded: 3, failed: 0 });
        assert_eq!(f.provider.calls_to("pause_collection").await, 1);
        assert_eq!(f.notifier.sent_keys().await, vec!["user-1:dunning_notice_1".to_string()]);
    }

    #[tokio::test]
    async fn provider_failure_does_not_stop_later_effects() {
        let f = fixture();
        let sub = paid_subscription();
        f.provider
            .fail_method("retry_invoice", PaymentError::Unreachable("connection reset".into()))
            .await;

        let report = f
            .dispatcher
            .dispatch(
                &sub,
                &[
                    SideEffect::ProviderRetryInvoice,
                    SideEffect::ActivateAccess,
                ],
            )
            .await;

        assert_eq!(report, DispatchReport { succeeded: 1, failed: 1 });
        assert_eq!(
            f.tokens.state_of(&sub.subscriber_id).await,
            Some(TokenState::Active)
        );
    }

    #[tokio::test]
    async fn provider_effects_are_skipped_without_provider_subscription() {
        let f = fixture();
        let sub = Subscription::start_trial(
            SubscriberId::new("user-2").unwrap(),
            "pro",
            BillingPeriod::Monthly,
            7,
            Timestamp::now(),
        );

        let report = f
            .dispatcher
            .dispatch(&sub, &[SideEffect::ProviderCancel { at_period_end: false }])
            .await;

        assert_eq!(report.failed, 0);
        assert!(f.provider.calls().await.is_empty());
    }

    #[tokio::test]
    async fn duplicate_notification_counts_as_success() {
        let f = fixture();
        let sub = paid_subscription();
        let effects = [SideEffect::Notify(NotificationTemplate::FinalNotice)];

        f.dispatcher.dispatch(&sub, &effects).await;
        let report = f.dispatcher.dispatch(&sub, &effects).await;

        assert_eq!(report.failed, 0);
        assert_eq!(f.notifier.sent().await.len(), 1);
    }
}
