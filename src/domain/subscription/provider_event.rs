//! Provider webhook events and their decoding into triggers.
//!
//! Accepts the native envelope `{event_id, event_type, payload}` and the
//! Stripe-shaped `{id, type, data: {object}}`. Only the fields this system
//! acts on are captured.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::foundation::{SubscriberId, Timestamp, ValidationError};

use super::webhook_errors::WebhookError;
use super::{
    BillingPeriod, CheckoutDetails, ProviderSnapshot, ProviderStatus, SubscriptionLocator, Trigger,
};

/// Plan recorded when a checkout carries no plan metadata.
pub const DEFAULT_PLAN_ID: &str = "standard";

/// Webhook event envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderEvent {
    /// Unique identifier for the event; the idempotency key.
    #[serde(alias = "id")]
    pub event_id: String,

    #[serde(alias = "type")]
    pub event_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ProviderEventData>,
}

/// Stripe-style container for the event object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderEventData {
    pub object: serde_json::Value,
}

impl ProviderEvent {
    /// Parses an event from the raw request body.
    pub fn from_slice(body: &[u8]) -> Result<Self, WebhookError> {
        let event: ProviderEvent = serde_json::from_slice(body)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;
        if event.event_id.trim().is_empty() {
            return Err(WebhookError::MissingField("event_id"));
        }
        Ok(event)
    }

    pub fn parsed_type(&self) -> ProviderEventType {
        ProviderEventType::from_str(&self.event_type)
    }

    /// The event object, from whichever envelope carried it.
    fn object(&self) -> Result<&serde_json::Value, WebhookError> {
        self.payload
            .as_ref()
            .or(self.data.as_ref().map(|d| &d.object))
            .ok_or(WebhookError::MissingField("payload"))
    }

    fn deserialize_object<T: serde::de::DeserializeOwned>(&self) -> Result<T, WebhookError> {
        T::deserialize(self.object()?).map_err(|e| WebhookError::MalformedPayload(e.to_string()))
    }

    /// Decodes the event into the action the ingestion path should take.
    pub fn decode(&self) -> Result<EventAction, WebhookError> {
        match self.parsed_type() {
            ProviderEventType::CheckoutCompleted => self.decode_checkout(),
            ProviderEventType::PaymentSucceeded => {
                let invoice: InvoiceObject = self.deserialize_object()?;
                let period_end = invoice.period_end.and_then(Timestamp::from_unix_secs);
                Ok(invoice.into_action(Trigger::PaymentSucceeded { period_end }))
            }
            ProviderEventType::PaymentFailed => {
                let invoice: InvoiceObject = self.deserialize_object()?;
                Ok(invoice.into_action(Trigger::PaymentFailed))
            }
            ProviderEventType::SubscriptionUpdated => {
                let object: SubscriptionObject = self.deserialize_object()?;
                let trigger = Trigger::ProviderUpdated(ProviderSnapshot {
                    status: ProviderStatus::parse(&object.status.unwrap_or_default()),
                    cancel_at_period_end: object.cancel_at_period_end,
                    current_period_end: object
                        .current_period_end
                        .and_then(Timestamp::from_unix_secs),
                });
                Ok(EventAction::Apply {
                    locator: SubscriptionLocator::ProviderSubscription(object.id),
                    trigger,
                })
            }
            ProviderEventType::SubscriptionDeleted => {
                let object: SubscriptionObject = self.deserialize_object()?;
                Ok(EventAction::Apply {
                    locator: SubscriptionLocator::ProviderSubscription(object.id),
                    trigger: Trigger::ProviderCanceled,
                })
            }
            ProviderEventType::Unknown => Ok(EventAction::Ignore {
                reason: format!("unhandled event type '{}'", self.event_type),
            }),
        }
    }

    fn decode_checkout(&self) -> Result<EventAction, WebhookError> {
        let session: CheckoutObject = self.deserialize_object()?;

        let Some(provider_subscription_id) = session.subscription else {
            return Ok(EventAction::Ignore {
                reason: "checkout without a subscription".to_string(),
            });
        };
        let provider_customer_id = session
            .customer
            .ok_or(WebhookError::MissingField("customer"))?;

        let subscriber_id = session
            .metadata
            .get("subscriber_id")
            .cloned()
            .or(session.client_reference_id)
            .ok_or(WebhookError::MissingMetadata("subscriber_id"))?;
        let subscriber_id = SubscriberId::new(subscriber_id)
            .map_err(|_| WebhookError::MissingMetadata("subscriber_id"))?;

        let plan_id = session
            .metadata
            .get("plan_id")
            .cloned()
            .unwrap_or_else(|| DEFAULT_PLAN_ID.to_string());
        let billing_period = match session.metadata.get("billing_period") {
            Some(raw) => raw
                .parse()
                .map_err(|e: ValidationError| {
                    WebhookError::MalformedPayload(e.to_string())
                })?,
            None => BillingPeriod::default(),
        };

        Ok(EventAction::Checkout {
            subscriber_id,
            plan_id,
            billing_period,
            details: CheckoutDetails {
                provider_subscription_id,
                provider_customer_id,
                period_start: session
                    .current_period_start
                    .and_then(Timestamp::from_unix_secs),
                period_end: session.current_period_end.and_then(Timestamp::from_unix_secs),
            },
        })
    }
}

/// What the ingestion path does with a decoded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventAction {
    /// Feed `trigger` to the record `locator` points at.
    Apply {
        locator: SubscriptionLocator,
        trigger: Trigger,
    },

    /// Apply a completed checkout to the subscriber's record, creating an
    /// Active record if the subscriber has none.
    Checkout {
        subscriber_id: SubscriberId,
        plan_id: String,
        billing_period: BillingPeriod,
        details: CheckoutDetails,
    },

    /// Acknowledge without acting.
    Ignore { reason: String },
}

/// Event types this system acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderEventType {
    CheckoutCompleted,
    PaymentSucceeded,
    PaymentFailed,
    SubscriptionUpdated,
    SubscriptionDeleted,
    Unknown,
}

impl ProviderEventType {
    /// Parse event type from string.
    pub fn from_str(s: &str) -> Self {
        match s {
            "checkout.session.completed" | "checkout.completed" => Self::CheckoutCompleted,
            "invoice.payment_succeeded" | "invoice.paid" | "payment.succeeded" => {
                Self::PaymentSucceeded
            }
            "invoice.payment_failed" | "payment.failed" => Self::PaymentFailed,
            "customer.subscription.updated" | "subscription.updated" => Self::SubscriptionUpdated,
            "customer.subscription.deleted" | "subscription.canceled" => Self::SubscriptionDeleted,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CheckoutObject {
    #[serde(default, alias = "subscription_id")]
    subscription: Option<String>,
    #[serde(default, alias = "customer_id")]
    customer: Option<String>,
    #[serde(default)]
    client_reference_id: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
    #[serde(default)]
    current_period_start: Option<i64>,
    #[serde(default)]
    current_period_end: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct InvoiceObject {
    #[serde(default, alias = "subscription_id")]
    subscription: Option<String>,
    #[serde(default)]
    period_end: Option<i64>,
}

impl InvoiceObject {
    fn into_action(self, trigger: Trigger) -> EventAction {
        match self.subscription {
            Some(id) => EventAction::Apply {
                locator: SubscriptionLocator::ProviderSubscription(id),
                trigger,
            },
            None => EventAction::Ignore {
                reason: "invoice not tied to a subscription".to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    #[serde(alias = "subscription_id")]
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    cancel_at_period_end: Option<bool>,
    #[serde(default)]
    current_period_end: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> ProviderEvent {
        ProviderEvent::from_slice(value.to_string().as_bytes()).unwrap()
    }

    #[test]
    fn native_envelope_decodes_payment_failed() {
        let event = parse(json!({
            "event_id": "evt_1",
            "event_type": "invoice.payment_failed",
            "payload": { "subscription": "sub_1" }
        }));

        assert_eq!(
            event.decode().unwrap(),
            EventAction::Apply {
                locator: SubscriptionLocator::ProviderSubscription("sub_1".to_string()),
                trigger: Trigger::PaymentFailed,
            }
        );
    }

    #[test]
    fn stripe_envelope_is_accepted() {
        let event = parse(json!({
            "id": "evt_2",
            "type": "customer.subscription.deleted",
            "data": { "object": { "id": "sub_2" } }
        }));

        assert_eq!(event.event_id, "evt_2");
        assert_eq!(
            event.decode().unwrap(),
            EventAction::Apply {
                locator: SubscriptionLocator::ProviderSubscription("sub_2".to_string()),
                trigger: Trigger::ProviderCanceled,
            }
        );
    }

    #[test]
    fn payment_succeeded_carries_period_end() {
        let event = parse(json!({
            "event_id": "evt_3",
            "event_type": "invoice.paid",
            "payload": { "subscription": "sub_1", "period_end": 1_800_000_000 }
        }));

        match event.decode().unwrap() {
            EventAction::Apply {
                trigger: Trigger::PaymentSucceeded { period_end },
                ..
            } => assert_eq!(period_end, Timestamp::from_unix_secs(1_800_000_000)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn checkout_reads_subscriber_and_plan_metadata() {
        let event = parse(json!({
            "event_id": "evt_4",
            "event_type": "checkout.session.completed",
            "payload": {
                "subscription": "sub_4",
                "customer": "cus_4",
                "metadata": { "subscriber_id": "user-4", "plan_id": "pro", "billing_period": "annual" }
            }
        }));

        match event.decode().unwrap() {
            EventAction::Checkout {
                subscriber_id,
                plan_id,
                billing_period,
                details,
            } => {
                assert_eq!(subscriber_id.as_str(), "user-4");
                assert_eq!(plan_id, "pro");
                assert_eq!(billing_period, BillingPeriod::Annual);
                assert_eq!(details.provider_customer_id, "cus_4");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn checkout_falls_back_to_client_reference_id() {
        let event = parse(json!({
            "event_id": "evt_5",
            "event_type": "checkout.session.completed",
            "payload": { "subscription": "sub_5", "customer": "cus_5", "client_reference_id": "user-5" }
        }));

        match event.decode().unwrap() {
            EventAction::Checkout {
                subscriber_id,
                plan_id,
                ..
            } => {
                assert_eq!(subscriber_id.as_str(), "user-5");
                assert_eq!(plan_id, DEFAULT_PLAN_ID);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn checkout_without_subscriber_is_rejected() {
        let event = parse(json!({
            "event_id": "evt_6",
            "event_type": "checkout.session.completed",
            "payload": { "subscription": "sub_6", "customer": "cus_6" }
        }));

        assert!(matches!(
            event.decode(),
            Err(WebhookError::MissingMetadata("subscriber_id"))
        ));
    }

    #[test]
    fn subscription_update_maps_provider_status() {
        let event = parse(json!({
            "event_id": "evt_7",
            "event_type": "customer.subscription.updated",
            "payload": { "id": "sub_7", "status": "past_due", "cancel_at_period_end": false }
        }));

        match event.decode().unwrap() {
            EventAction::Apply {
                trigger: Trigger::ProviderUpdated(snapshot),
                ..
            } => {
                assert_eq!(snapshot.status, ProviderStatus::PastDue);
                assert_eq!(snapshot.cancel_at_period_end, Some(false));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_event_type_is_ignored() {
        let event = parse(json!({
            "event_id": "evt_8",
            "event_type": "customer.created",
            "payload": {}
        }));

        assert!(matches!(event.decode(), Ok(EventAction::Ignore { .. })));
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(matches!(
            ProviderEvent::from_slice(b"not json"),
            Err(WebhookError::MalformedPayload(_))
        ));
    }

    #[test]
    fn missing_payload_is_rejected() {
        let event = parse(json!({ "event_id": "evt_9", "event_type": "invoice.payment_failed" }));
        assert!(matches!(event.decode(), Err(WebhookError::MissingField("payload"))));
    }
}
