//! GetSubscriptionHandler - Query handler for a subscriber's own record.

use std::sync::Arc;

use crate::domain::foundation::SubscriberId;
use crate::domain::subscription::{LifecycleError, Subscription, SubscriptionLocator};
use crate::ports::SubscriptionStore;

#[derive(Debug, Clone)]
pub struct GetSubscriptionQuery {
    pub subscriber_id: SubscriberId,
}

pub struct GetSubscriptionHandler {
    store: Arc<dyn SubscriptionStore>,
}

impl GetSubscriptionHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, query: GetSubscriptionQuery) -> Result<Subscription, LifecycleError> {
        self.store
            .load_by_subscriber_id(&query.subscriber_id)
            .await?
            .ok_or_else(|| {
                LifecycleError::not_found(SubscriptionLocator::Subscriber(query.subscriber_id))
            })
    }
}
