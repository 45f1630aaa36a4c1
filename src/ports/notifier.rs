//! Notification port.
//!
//! Sends lifecycle and outreach notifications. Implementations deduplicate by
//! `(subscriber, template key)`: sending the same notification twice delivers
//! it once.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::foundation::{DomainError, SubscriberId};
use crate::domain::subscription::{NotificationTemplate, Subscription};

/// A notification addressed to one subscriber.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub subscriber_id: SubscriberId,
    pub template: NotificationTemplate,
    /// Template variables.
    pub context: serde_json::Value,
}

impl Notification {
    /// Notification about `subscription`, with its lifecycle fields as context.
    pub fn for_subscription(subscription: &Subscription, template: NotificationTemplate) -> Self {
        Self {
            subscriber_id: subscription.subscriber_id.clone(),
            template,
            context: serde_json::json!({
                "subscription_id": subscription.id.to_string(),
                "plan_id": subscription.plan_id,
                "status": subscription.status.as_str(),
                "trial_end": subscription.trial_end.map(|t| t.to_string()),
                "current_period_end": subscription.current_period_end.map(|t| t.to_string()),
                "dunning_next_retry_at": subscription.dunning_next_retry_at.map(|t| t.to_string()),
            }),
        }
    }

    /// Key under which the notification is delivered at most once.
    pub fn dedupe_key(&self) -> String {
        format!("{}:{}", self.subscriber_id, self.template.key())
    }
}

/// Whether a send produced a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Duplicate,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<SendOutcome, DomainError>;
}
