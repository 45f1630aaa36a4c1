//! ManualActionHandler - Subscriber-initiated cancel, pause and resume.

use std::sync::Arc;

use crate::domain::foundation::{SubscriberId, Timestamp};
use crate::domain::subscription::{LifecycleError, Subscription, SubscriptionLocator, Trigger};

use super::lifecycle_service::{ApplyOutcome, LifecycleService};

/// An action a subscriber can request on their own subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualAction {
    /// Cancel now, or at the end of the current period.
    Cancel { immediate: bool },
    Pause,
    Resume,
}

impl ManualAction {
    fn trigger(self) -> Trigger {
        match self {
            ManualAction::Cancel { immediate } => Trigger::ManualCancelRequested { immediate },
            ManualAction::Pause => Trigger::ManualPauseRequested,
            ManualAction::Resume => Trigger::ManualResumeRequested,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ManualActionCommand {
    pub subscriber_id: SubscriberId,
    pub action: ManualAction,
}

pub struct ManualActionHandler {
    lifecycle: Arc<LifecycleService>,
}

impl ManualActionHandler {
    pub fn new(lifecycle: Arc<LifecycleService>) -> Self {
        Self { lifecycle }
    }

    /// Apply the action and return the resulting record.
    ///
    /// # Errors
    ///
    /// - `Ineligible` if the current status has no rule for the action
    /// - `Conflict` if concurrent writers won every attempt
    pub async fn handle(&self, cmd: ManualActionCommand) -> Result<Subscription, LifecycleError> {
        let locator = SubscriptionLocator::Subscriber(cmd.subscriber_id);

        match self
            .lifecycle
            .apply(&locator, &cmd.action.trigger(), Timestamp::now())
            .await?
        {
            ApplyOutcome::Applied { subscription, .. } | ApplyOutcome::Unchanged(subscription) => {
                Ok(subscription)
            }
            ApplyOutcome::Rejected(rejection) => Err(LifecycleError::Ineligible(rejection)),
        }
    }
}
