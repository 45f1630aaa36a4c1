//! Log-only notifier.
//!
//! Used when no notification service is configured, and by tests. Delivery
//! is a structured log line; the dedupe set lives in process memory, so a
//! restart forgets what was sent.

use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::RwLock;

use crate::domain::foundation::DomainError;
use crate::ports::{Notification, Notifier, SendOutcome};

#[derive(Default)]
pub struct LogNotifier {
    sent: RwLock<Vec<Notification>>,
    seen: RwLock<HashSet<String>>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications delivered so far, duplicates excluded.
    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.read().await.clone()
    }

    /// Dedupe keys (`subscriber:template`) of delivered notifications, in order.
    pub async fn sent_keys(&self) -> Vec<String> {
        self.sent
            .read()
            .await
            .iter()
            .map(Notification::dedupe_key)
            .collect()
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<SendOutcome, DomainError> {
        let key = notification.dedupe_key();
        if !self.seen.write().await.insert(key.clone()) {
            tracing::debug!(dedupe_key = %key, "Notification already sent, skipping");
            return Ok(SendOutcome::Duplicate);
        }

        tracing::info!(
            subscriber_id = %notification.subscriber_id,
            template = %notification.template.key(),
            context = %notification.context,
            "Notification sent"
        );
        self.sent.write().await.push(notification.clone());
        Ok(SendOutcome::Sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{SubscriberId, Timestamp};
    use crate::domain::subscription::{BillingPeriod, NotificationTemplate, Subscription};

    fn trial(subscriber: &str) -> Subscription {
        Subscription::start_trial(
            SubscriberId::new(subscriber).unwrap(),
            "pro",
            BillingPeriod::Monthly,
            7,
            Timestamp::now(),
        )
    }

    #[tokio::test]
    async fn repeated_template_is_delivered_once() {
        let notifier = LogNotifier::new();
        let n = Notification::for_subscription(&trial("user-1"), NotificationTemplate::TrialEnded);

        assert_eq!(notifier.send(&n).await.unwrap(), SendOutcome::Sent);
        assert_eq!(notifier.send(&n).await.unwrap(), SendOutcome::Duplicate);
        assert_eq!(notifier.sent_keys().await, vec!["user-1:trial_ended".to_string()]);
    }

    #[tokio::test]
    async fn same_template_for_different_subscribers_is_not_deduped() {
        let notifier = LogNotifier::new();
        let a = Notification::for_subscription(&trial("user-a"), NotificationTemplate::WinBack);
        let b = Notification::for_subscription(&trial("user-b"), NotificationTemplate::WinBack);

        notifier.send(&a).await.unwrap();
        notifier.send(&b).await.unwrap();

        assert_eq!(notifier.sent().await.len(), 2);
    }
}
