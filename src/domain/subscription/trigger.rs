//! Triggers fed into the transition engine.
//!
//! Provider events, subscriber actions, and elapsed-time conditions all
//! arrive as one tagged enum so there is exactly one decision point.

use crate::domain::foundation::Timestamp;
use serde::{Deserialize, Serialize};

/// Something that may move a subscription to a new status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    /// Provider confirmed a completed checkout.
    CheckoutCompleted(CheckoutDetails),

    /// Provider collected an invoice. `period_end` is the new period bound
    /// when the invoice carried one.
    PaymentSucceeded { period_end: Option<Timestamp> },

    /// Provider failed to collect an invoice.
    PaymentFailed,

    /// Provider reports the subscription as deleted.
    ProviderCanceled,

    /// Provider reports a change to the subscription object.
    ProviderUpdated(ProviderSnapshot),

    /// Subscriber asked to cancel, now or at period end.
    ManualCancelRequested { immediate: bool },

    /// Subscriber asked to pause collection.
    ManualPauseRequested,

    /// Subscriber asked to resume collection.
    ManualResumeRequested,

    /// Sweep found `trial_end <= now`.
    TrialWindowElapsed,

    /// Sweep found `dunning_next_retry_at <= now`.
    DunningRetryDue,

    /// Sweep found `pause_resumes_at <= now`.
    PauseWindowElapsed,
}

impl Trigger {
    /// Short name for structured logs.
    pub fn name(&self) -> &'static str {
        match self {
            Trigger::CheckoutCompleted(_) => "checkout_completed",
            Trigger::PaymentSucceeded { .. } => "payment_succeeded",
            Trigger::PaymentFailed => "payment_failed",
            Trigger::ProviderCanceled => "provider_canceled",
            Trigger::ProviderUpdated(_) => "provider_updated",
            Trigger::ManualCancelRequested { .. } => "manual_cancel_requested",
            Trigger::ManualPauseRequested => "manual_pause_requested",
            Trigger::ManualResumeRequested => "manual_resume_requested",
            Trigger::TrialWindowElapsed => "trial_window_elapsed",
            Trigger::DunningRetryDue => "dunning_retry_due",
            Trigger::PauseWindowElapsed => "pause_window_elapsed",
        }
    }

    /// Returns true for triggers synthesized by the policy sweeps.
    pub fn is_time_based(&self) -> bool {
        matches!(
            self,
            Trigger::TrialWindowElapsed | Trigger::DunningRetryDue | Trigger::PauseWindowElapsed
        )
    }
}

/// Correlation data carried by a completed checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutDetails {
    pub provider_subscription_id: String,
    pub provider_customer_id: String,
    pub period_start: Option<Timestamp>,
    pub period_end: Option<Timestamp>,
}

/// Provider-side view of a subscription, as reported by an update event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSnapshot {
    pub status: ProviderStatus,
    pub cancel_at_period_end: Option<bool>,
    pub current_period_end: Option<Timestamp>,
}

/// Subscription status as the payment provider names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Trialing,
    Active,
    PastDue,
    Unpaid,
    Paused,
    Canceled,
    Incomplete,
    IncompleteExpired,
    Unknown,
}

impl ProviderStatus {
    /// Parses the provider's status string. Unrecognized values map to
    /// `Unknown` so a new provider status surfaces as drift, not a decode error.
    pub fn parse(s: &str) -> Self {
        match s {
            "trialing" => ProviderStatus::Trialing,
            "active" => ProviderStatus::Active,
            "past_due" => ProviderStatus::PastDue,
            "unpaid" => ProviderStatus::Unpaid,
            "paused" => ProviderStatus::Paused,
            "canceled" | "cancelled" => ProviderStatus::Canceled,
            "incomplete" => ProviderStatus::Incomplete,
            "incomplete_expired" => ProviderStatus::IncompleteExpired,
            _ => ProviderStatus::Unknown,
        }
    }
}
