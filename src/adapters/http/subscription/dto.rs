//! HTTP DTOs (Data Transfer Objects) for subscription endpoints.
//!
//! These types define the JSON request/response structure for the subscription
//! API and the provider webhook acknowledgement.

use crate::application::IngestOutcome;
use crate::domain::foundation::{SubscriberId, SubscriptionId, Timestamp};
use crate::domain::subscription::{BillingPeriod, Subscription, SubscriptionStatus};
use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to start a free trial.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartTrialRequest {
    /// Plan to trial. Defaults to the standard plan.
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default)]
    pub billing_period: BillingPeriod,
}

/// Request to cancel a subscription.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelSubscriptionRequest {
    /// Cancel now instead of at the end of the current period.
    #[serde(default)]
    pub immediate: bool,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Subscriber-facing view of a subscription record.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionResponse {
    pub id: SubscriptionId,
    pub subscriber_id: SubscriberId,
    pub plan_id: String,
    pub billing_period: BillingPeriod,
    pub status: SubscriptionStatus,
    pub has_access: bool,
    pub is_trial: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_end: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_period_end: Option<Timestamp>,
    pub cancel_at_period_end: bool,
    pub dunning_count: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dunning_next_retry_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pause_resumes_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canceled_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(s: Subscription) -> Self {
        Self {
            has_access: s.grants_access(),
            id: s.id,
            subscriber_id: s.subscriber_id,
            plan_id: s.plan_id,
            billing_period: s.billing_period,
            status: s.status,
            is_trial: s.is_trial,
            trial_end: s.trial_end,
            current_period_end: s.current_period_end,
            cancel_at_period_end: s.cancel_at_period_end,
            dunning_count: s.dunning_count,
            dunning_next_retry_at: s.dunning_next_retry_at,
            pause_resumes_at: s.pause_resumes_at,
            canceled_at: s.canceled_at,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

/// Acknowledgement returned to the payment provider.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAckResponse {
    pub received: bool,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<IngestOutcome> for WebhookAckResponse {
    fn from(outcome: IngestOutcome) -> Self {
        let status = outcome.as_str();
        let reason = match outcome {
            IngestOutcome::Ignored(reason) => Some(reason),
            _ => None,
        };
        Self {
            received: true,
            outcome: status,
            reason,
        }
    }
}

/// Liveness response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Error response body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
    /// Whether the same request may succeed later.
    pub retryable: bool,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            retryable: false,
        }
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }
}
