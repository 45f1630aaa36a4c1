//! StartTrialHandler - Command handler for starting a free trial.

use std::sync::Arc;

use crate::domain::foundation::{SubscriberId, Timestamp};
use crate::domain::subscription::{
    BillingPeriod, LifecycleError, SideEffect, Subscription, DEFAULT_PLAN_ID,
};

use super::lifecycle_service::LifecycleService;

#[derive(Debug, Clone)]
pub struct StartTrialCommand {
    pub subscriber_id: SubscriberId,
    pub plan_id: Option<String>,
    pub billing_period: BillingPeriod,
}

pub struct StartTrialHandler {
    lifecycle: Arc<LifecycleService>,
    trial_days: i64,
}

impl StartTrialHandler {
    pub fn new(lifecycle: Arc<LifecycleService>, trial_days: i64) -> Self {
        Self {
            lifecycle,
            trial_days,
        }
    }

    /// Create a `Trialing` record and activate the subscriber's token.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if the subscriber has any subscription record.
    pub async fn handle(&self, cmd: StartTrialCommand) -> Result<Subscription, LifecycleError> {
        let trial = Subscription::start_trial(
            cmd.subscriber_id,
            cmd.plan_id.unwrap_or_else(|| DEFAULT_PLAN_ID.to_string()),
            cmd.billing_period,
            self.trial_days,
            Timestamp::now(),
        );

        self.lifecycle
            .create(trial, &[SideEffect::ActivateAccess])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryAccessTokens, InMemorySubscriptionStore, TokenState};
    use crate::adapters::notifications::LogNotifier;
    use crate::adapters::stripe::MockPaymentProvider;
    use crate::application::handlers::subscription::SideEffectDispatcher;
    use crate::domain::subscription::SubscriptionStatus;
    use std::time::Duration;

    fn handler(tokens: Arc<InMemoryAccessTokens>) -> StartTrialHandler {
        let dispatcher = Arc::new(SideEffectDispatcher::new(
            tokens,
            Arc::new(LogNotifier::new()),
            Arc::new(MockPaymentProvider::new()),
            Duration::from_secs(1),
        ));
        let lifecycle = Arc::new(LifecycleService::new(
            Arc::new(InMemorySubscriptionStore::new()),
            dispatcher,
            3,
        ));
        StartTrialHandler::new(lifecycle, 14)
    }

    fn cmd() -> StartTrialCommand {
        StartTrialCommand {
            subscriber_id: SubscriberId::new("user-1").unwrap(),
            plan_id: None,
            billing_period: BillingPeriod::Monthly,
        }
    }

    #[tokio::test]
    async fn starts_trial_with_configured_length() {
        let tokens = Arc::new(InMemoryAccessTokens::new());
        let handler = handler(tokens.clone());

        let sub = handler.handle(cmd()).await.unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Trialing);
        assert_eq!(sub.plan_id, DEFAULT_PLAN_ID);
        let length = sub.trial_end.unwrap().duration_since(&sub.trial_start.unwrap());
        assert_eq!(length.num_days(), 14);
        assert_eq!(
            tokens.state_of(&sub.subscriber_id).await,
            Some(TokenState::Active)
        );
    }

    #[tokio::test]
    async fn second_trial_for_subscriber_is_refused() {
        let handler = handler(Arc::new(InMemoryAccessTokens::new()));
        handler.handle(cmd()).await.unwrap();

        let err = handler.handle(cmd()).await.unwrap_err();
        assert!(matches!(err, LifecycleError::AlreadyExists(_)));
    }
}
