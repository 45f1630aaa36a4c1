//! Webhook error types for provider event ingestion.
//!
//! Every error maps to an HTTP status that tells the provider whether to
//! redeliver: 2xx acknowledged, 4xx permanently invalid, 5xx retry later.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors that occur while ingesting a provider event.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature header missing or does not match the body.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Signature timestamp is older than the replay window.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Signature timestamp is in the future beyond clock skew tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Body or signature header could not be parsed.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Required field missing from the event payload.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Required metadata entry missing from the event payload.
    #[error("Missing metadata: {0}")]
    MissingMetadata(&'static str),

    /// No subscription matches the event. May be an ordering race with the
    /// event that creates it.
    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),

    /// Another delivery of the same event holds the claim.
    #[error("Event {0} is already being processed")]
    EventInFlight(String),

    /// Compare-and-swap kept losing to concurrent writers.
    #[error("Concurrent update conflict after {attempts} attempts")]
    ConflictExhausted { attempts: u32 },

    /// Event type this system does not act on.
    #[error("Event ignored: {0}")]
    Ignored(String),

    /// Store or event log failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl WebhookError {
    /// Returns true if the provider should redeliver this event.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::SubscriptionNotFound(_)
                | WebhookError::EventInFlight(_)
                | WebhookError::ConflictExhausted { .. }
                | WebhookError::Storage(_)
        )
    }

    /// Maps the error to the HTTP status returned to the provider.
    pub fn status_code(&self) -> StatusCode {
        match self {
            // Auth failures - don't retry
            WebhookError::InvalidSignature | WebhookError::TimestampOutOfRange => {
                StatusCode::UNAUTHORIZED
            }

            // Bad request - don't retry
            WebhookError::InvalidTimestamp
            | WebhookError::MalformedPayload(_)
            | WebhookError::MissingField(_)
            | WebhookError::MissingMetadata(_) => StatusCode::BAD_REQUEST,

            // Ignored events are acknowledged as success
            WebhookError::Ignored(_) => StatusCode::OK,

            // Transient - will retry
            WebhookError::SubscriptionNotFound(_)
            | WebhookError::EventInFlight(_)
            | WebhookError::ConflictExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            WebhookError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
