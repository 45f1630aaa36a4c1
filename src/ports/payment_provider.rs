//! Payment provider port for lifecycle callbacks.
//!
//! Only the calls the lifecycle needs after a status change: cancel, retry
//! the open invoice, pause and resume collection. Checkout creation, refunds
//! and the rest of the provider API are out of scope.
//!
//! Calls are best effort. The status change that caused them is already
//! committed, so a failure is logged and never rolled back. Repeating a call
//! leaves the provider in the same state.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Port for payment provider callbacks.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Cancel a subscription.
    ///
    /// If `at_period_end` is true, the subscription stays active until the
    /// current period ends.
    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<(), PaymentError>;

    /// Retry payment of the subscription's latest open invoice.
    async fn retry_invoice(&self, subscription_id: &str) -> Result<(), PaymentError>;

    /// Stop collecting payments for the subscription.
    async fn pause_collection(&self, subscription_id: &str) -> Result<(), PaymentError>;

    /// Resume collecting payments for the subscription.
    async fn resume_collection(&self, subscription_id: &str) -> Result<(), PaymentError>;
}

/// Why a provider callback failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("payment provider unreachable: {0}")]
    Unreachable(String),

    #[error("payment provider did not answer within {0:?}")]
    TimedOut(Duration),

    #[error("payment provider rejected our credentials")]
    Unauthorized,

    #[error("payment provider has no {0}")]
    UnknownResource(String),

    #[error("payment provider rate limit reached")]
    RateLimited,

    /// Any other non-success answer. `provider_code` is the provider's own
    /// machine-readable code when the body carried one.
    #[error("payment provider refused the call (HTTP {status}): {message}")]
    Refused {
        status: u16,
        provider_code: Option<String>,
        message: String,
    },
}

impl PaymentError {
    /// Whether the same call might succeed if repeated later.
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::Unreachable(_) | PaymentError::TimedOut(_) | PaymentError::RateLimited => {
                true
            }
            PaymentError::Refused { status, .. } => *status >= 500,
            PaymentError::Unauthorized | PaymentError::UnknownResource(_) => false,
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PaymentError::Unreachable(_) => "unreachable",
            PaymentError::TimedOut(_) => "timed_out",
            PaymentError::Unauthorized => "unauthorized",
            PaymentError::UnknownResource(_) => "unknown_resource",
            PaymentError::RateLimited => "rate_limited",
            PaymentError::Refused { .. } => "refused",
        }
    }
}
