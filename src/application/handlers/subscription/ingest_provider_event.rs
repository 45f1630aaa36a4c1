//! IngestProviderEventHandler - Command handler for provider webhooks.
//!
//! Verify, decode, claim, apply, mark processed. A claim is released on any
//! failure after it was taken, so the provider's redelivery can try again.

use std::sync::Arc;

use crate::domain::foundation::Timestamp;
use crate::domain::subscription::{
    EventAction, LifecycleError, ProviderEvent, SideEffect, Subscription, SubscriptionLocator,
    Trigger, Verification, WebhookError, WebhookVerifier,
};
use crate::ports::{ClaimOutcome, ProcessedEventLog};

use super::lifecycle_service::{ApplyOutcome, LifecycleService};

/// Command carrying a raw webhook delivery.
#[derive(Debug, Clone)]
pub struct IngestProviderEventCommand {
    pub payload: Vec<u8>,
    /// `Provider-Signature` header value, if present.
    pub signature: Option<String>,
}

/// How a delivery was handled. Every variant is acknowledged with 200.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Applied,
    Created,
    Unchanged,
    /// Drift or stale trigger; logged and marked processed.
    Rejected,
    AlreadyProcessed,
    Ignored(String),
}

impl IngestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestOutcome::Applied => "applied",
            IngestOutcome::Created => "created",
            IngestOutcome::Unchanged => "unchanged",
            IngestOutcome::Rejected => "rejected",
            IngestOutcome::AlreadyProcessed => "already_processed",
            IngestOutcome::Ignored(_) => "ignored",
        }
    }
}

pub struct IngestProviderEventHandler {
    verifier: Arc<WebhookVerifier>,
    event_log: Arc<dyn ProcessedEventLog>,
    lifecycle: Arc<LifecycleService>,
}

impl IngestProviderEventHandler {
    pub fn new(
        verifier: Arc<WebhookVerifier>,
        event_log: Arc<dyn ProcessedEventLog>,
        lifecycle: Arc<LifecycleService>,
    ) -> Self {
        Self {
            verifier,
            event_log,
            lifecycle,
        }
    }

    pub async fn handle(
        &self,
        cmd: IngestProviderEventCommand,
    ) -> Result<IngestOutcome, WebhookError> {
        // 1. Signature
        let verification = self
            .verifier
            .verify(&cmd.payload, cmd.signature.as_deref())?;

        // 2. Decode
        let event = ProviderEvent::from_slice(&cmd.payload)?;
        let action = event.decode()?;

        if let EventAction::Ignore { reason } = &action {
            tracing::debug!(
                event_id = %event.event_id,
                event_type = %event.event_type,
                reason = %reason,
                "Provider event ignored"
            );
            return Ok(IngestOutcome::Ignored(reason.clone()));
        }

        // 3. Claim
        match self
            .event_log
            .try_claim(&event.event_id, &event.event_type)
            .await
            .map_err(|e| WebhookError::Storage(e.to_string()))?
        {
            ClaimOutcome::Claimed => {}
            ClaimOutcome::AlreadyProcessed => {
                tracing::info!(event_id = %event.event_id, "Provider event already processed");
                return Ok(IngestOutcome::AlreadyProcessed);
            }
            ClaimOutcome::InFlight => {
                return Err(WebhookError::EventInFlight(event.event_id.clone()));
            }
        }

        // 4. Apply
        let result = self.process(action, Timestamp::now()).await;

        // 5. Record
        match result {
            Ok(outcome) => {
                self.event_log
                    .mark_processed(&event.event_id)
                    .await
                    .map_err(|e| WebhookError::Storage(e.to_string()))?;
                tracing::info!(
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    outcome = outcome.as_str(),
                    verified = matches!(verification, Verification::Verified),
                    "Provider event processed"
                );
                Ok(outcome)
            }
            Err(err) => {
                if let Err(release_err) = self.event_log.release(&event.event_id).await {
                    tracing::error!(
                        event_id = %event.event_id,
                        error = %release_err,
                        "Failed to release event claim; it will expire with its lease"
                    );
                }
                tracing::warn!(
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    error = %err,
                    "Provider event processing failed"
                );
                Err(err)
            }
        }
    }

    async fn process(
        &self,
        action: EventAction,
        now: Timestamp,
    ) -> Result<IngestOutcome, WebhookError> {
        match action {
            EventAction::Apply { locator, trigger } => self.apply(&locator, &trigger, now).await,
            EventAction::Checkout {
                subscriber_id,
                plan_id,
                billing_period,
                details,
            } => {
                let locator = SubscriptionLocator::Subscriber(subscriber_id.clone());
                let existing = self
                    .lifecycle
                    .store()
                    .load_by(&locator)
                    .await
                    .map_err(|e| WebhookError::Storage(e.to_string()))?;

                match existing {
                    Some(current) => {
                        self.apply_to(current, &Trigger::CheckoutCompleted(details), now)
                            .await
                    }
                    None => {
                        let fresh = Subscription::from_checkout(
                            subscriber_id,
                            plan_id,
                            billing_period,
                            &details,
                            now,
                        );
                        self.lifecycle
                            .create(fresh, &[SideEffect::ActivateAccess])
                            .await
                            .map(|_| IngestOutcome::Created)
                            .map_err(to_webhook_error)
                    }
                }
            }
            EventAction::Ignore { reason } => Ok(IngestOutcome::Ignored(reason)),
        }
    }

    async fn apply(
        &self,
        locator: &SubscriptionLocator,
        trigger: &Trigger,
        now: Timestamp,
    ) -> Result<IngestOutcome, WebhookError> {
        self.lifecycle
            .apply(locator, trigger, now)
            .await
            .map(ingest_outcome)
            .map_err(to_webhook_error)
    }

    async fn apply_to(
        &self,
        current: Subscription,
        trigger: &Trigger,
        now: Timestamp,
    ) -> Result<IngestOutcome, WebhookError> {
        self.lifecycle
            .apply_to(current, trigger, now)
            .await
            .map(ingest_outcome)
            .map_err(to_webhook_error)
    }
}

fn ingest_outcome(outcome: ApplyOutcome) -> IngestOutcome {
    match outcome {
        ApplyOutcome::Applied { .. } => IngestOutcome::Applied,
        ApplyOutcome::Unchanged(_) => IngestOutcome::Unchanged,
        ApplyOutcome::Rejected(_) => IngestOutcome::Rejected,
    }
}

fn to_webhook_error(err: LifecycleError) -> WebhookError {
    match err {
        LifecycleError::NotFound(locator) => WebhookError::SubscriptionNotFound(locator.to_string()),
        LifecycleError::Conflict { attempts } => WebhookError::ConflictExhausted { attempts },
        // A concurrent checkout created the record first; redelivery applies
        // the event to it.
        LifecycleError::AlreadyExists(subscriber) => {
            WebhookError::Storage(format!("subscription for {} created concurrently", subscriber))
        }
        LifecycleError::Ineligible(rejection) => WebhookError::Storage(rejection.to_string()),
        LifecycleError::Infrastructure(msg) => WebhookError::Storage(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryAccessTokens, InMemoryProcessedEventLog, InMemorySubscriptionStore, TokenState,
    };
    use crate::adapters::notifications::LogNotifier;
    use crate::adapters::stripe::MockPaymentProvider;
    use crate::application::handlers::subscription::SideEffectDispatcher;
    use crate::domain::foundation::SubscriberId;
    use crate::domain::subscription::{sign_payload, SubscriptionStatus};
    use crate::ports::SubscriptionStore;
    use secrecy::SecretString;
    use serde_json::json;
    use std::time::Duration;

    const SECRET: &str = "whsec_test";

    struct Fixture {
        store: Arc<InMemorySubscriptionStore>,
        log: Arc<InMemoryProcessedEventLog>,
        tokens: Arc<InMemoryAccessTokens>,
        handler: IngestProviderEventHandler,
    }

    fn fixture(secret: Option<&str>) -> Fixture {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let log = Arc::new(InMemoryProcessedEventLog::new());
        let tokens = Arc::new(InMemoryAccessTokens::new());
        let dispatcher = Arc::new(SideEffectDispatcher::new(
            tokens.clone(),
            Arc::new(LogNotifier::new()),
            Arc::new(MockPaymentProvider::new()),
            Duration::from_secs(1),
        ));
        let lifecycle = Arc::new(LifecycleService::new(store.clone(), dispatcher, 3));
        let verifier = Arc::new(WebhookVerifier::new(
            secret.map(|s| SecretString::new(s.to_string())),
        ));
        let handler = IngestProviderEventHandler::new(verifier, log.clone(), lifecycle);
        Fixture {
            store,
            log,
            tokens,
            handler,
        }
    }

    fn signed(body: &serde_json::Value) -> IngestProviderEventCommand {
        let payload = serde_json::to_vec(body).unwrap();
        let signature =
            sign_payload(SECRET, chrono::Utc::now().timestamp(), &payload).unwrap();
        IngestProviderEventCommand {
            payload,
            signature: Some(signature),
        }
    }

    fn checkout_event(event_id: &str) -> serde_json::Value {
        json!({
            "event_id": event_id,
            "event_type": "checkout.session.completed",
            "payload": {
                "subscription": "sub_1",
                "customer": "cus_1",
                "metadata": { "subscriber_id": "user-1", "plan_id": "pro" }
            }
        })
    }

    #[tokio::test]
    async fn checkout_for_new_subscriber_creates_active_record() {
        let f = fixture(Some(SECRET));

        let outcome = f.handler.handle(signed(&checkout_event("evt_1"))).await.unwrap();

        assert_eq!(outcome, IngestOutcome::Created);
        let sub = f
            .store
            .load_by_provider_subscription_id("sub_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.plan_id, "pro");
        assert_eq!(
            f.tokens.state_of(&SubscriberId::new("user-1").unwrap()).await,
            Some(TokenState::Active)
        );
        assert!(f.log.is_processed("evt_1").await);
    }

    #[tokio::test]
    async fn redelivery_is_acknowledged_without_second_transition() {
        let f = fixture(Some(SECRET));
        f.handler.handle(signed(&checkout_event("evt_1"))).await.unwrap();
        let failed = json!({
            "event_id": "evt_2",
            "event_type": "invoice.payment_failed",
            "payload": { "subscription": "sub_1" }
        });

        let first = f.handler.handle(signed(&failed)).await.unwrap();
        let second = f.handler.handle(signed(&failed)).await.unwrap();

        assert_eq!(first, IngestOutcome::Applied);
        assert_eq!(second, IngestOutcome::AlreadyProcessed);
        let sub = f
            .store
            .load_by_provider_subscription_id("sub_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sub.status, SubscriptionStatus::PastDue);
        assert_eq!(sub.dunning_count, 1);
    }

    #[tokio::test]
    async fn bad_signature_is_rejected_before_claim() {
        let f = fixture(Some(SECRET));
        let mut cmd = signed(&checkout_event("evt_1"));
        cmd.payload = serde_json::to_vec(&checkout_event("evt_tampered")).unwrap();

        let err = f.handler.handle(cmd).await.unwrap_err();

        assert!(matches!(err, WebhookError::InvalidSignature));
        assert!(f.log.event_type_of("evt_tampered").await.is_none());
    }

    #[tokio::test]
    async fn unknown_subscription_releases_claim_for_retry() {
        let f = fixture(Some(SECRET));
        let failed = json!({
            "event_id": "evt_early",
            "event_type": "invoice.payment_failed",
            "payload": { "subscription": "sub_unknown" }
        });

        let err = f.handler.handle(signed(&failed)).await.unwrap_err();

        assert!(err.is_retryable());
        assert!(f.log.event_type_of("evt_early").await.is_none());
    }

    #[tokio::test]
    async fn drift_is_acknowledged_and_marked_processed() {
        let f = fixture(Some(SECRET));
        f.handler.handle(signed(&checkout_event("evt_1"))).await.unwrap();
        let deleted = json!({
            "event_id": "evt_del",
            "event_type": "customer.subscription.deleted",
            "payload": { "id": "sub_1" }
        });
        f.handler.handle(signed(&deleted)).await.unwrap();
        let paused = json!({
            "event_id": "evt_paused",
            "event_type": "customer.subscription.updated",
            "payload": { "id": "sub_1", "status": "paused" }
        });

        let outcome = f.handler.handle(signed(&paused)).await.unwrap();

        assert_eq!(outcome, IngestOutcome::Rejected);
        assert!(f.log.is_processed("evt_paused").await);
    }

    #[tokio::test]
    async fn unknown_event_type_is_ignored() {
        let f = fixture(Some(SECRET));
        let body = json!({
            "event_id": "evt_x",
            "event_type": "customer.created",
            "payload": {}
        });

        let outcome = f.handler.handle(signed(&body)).await.unwrap();
        assert!(matches!(outcome, IngestOutcome::Ignored(_)));
    }

    #[tokio::test]
    async fn unsigned_event_is_accepted_without_secret() {
        let f = fixture(None);
        let cmd = IngestProviderEventCommand {
            payload: serde_json::to_vec(&checkout_event("evt_1")).unwrap(),
            signature: None,
        };

        let outcome = f.handler.handle(cmd).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Created);
    }
}
