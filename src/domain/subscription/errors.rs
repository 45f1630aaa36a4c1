//! Lifecycle error types for the apply path.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | NotFound | 404 |
//! | AlreadyExists | 409 |
//! | Conflict | 409 |
//! | Ineligible | 422 |
//! | Infrastructure | 500 |

use crate::domain::foundation::{DomainError, ErrorCode};

use super::engine::Rejection;
use super::SubscriptionLocator;

/// Errors raised while applying a trigger to a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// No subscription matches the locator.
    NotFound(SubscriptionLocator),

    /// The subscriber already has a subscription.
    AlreadyExists(String),

    /// Every compare-and-swap attempt lost to a concurrent writer.
    Conflict { attempts: u32 },

    /// The engine has no rule for this trigger in the current status.
    Ineligible(Rejection),

    /// Store failure.
    Infrastructure(String),
}

impl LifecycleError {
    pub fn not_found(locator: SubscriptionLocator) -> Self {
        LifecycleError::NotFound(locator)
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        LifecycleError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            LifecycleError::NotFound(_) => ErrorCode::SubscriptionNotFound,
            LifecycleError::AlreadyExists(_) => ErrorCode::SubscriptionExists,
            LifecycleError::Conflict { .. } | LifecycleError::Ineligible(_) => {
                ErrorCode::InvalidStateTransition
            }
            LifecycleError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Returns a user-friendly error message.
    pub fn message(&self) -> String {
        match self {
            LifecycleError::NotFound(locator) => format!("Subscription not found: {}", locator),
            LifecycleError::AlreadyExists(subscriber) => {
                format!("Subscriber {} already has a subscription", subscriber)
            }
            LifecycleError::Conflict { attempts } => format!(
                "Subscription was modified concurrently; gave up after {} attempts",
                attempts
            ),
            LifecycleError::Ineligible(rejection) => format!("Not allowed: {}", rejection),
            LifecycleError::Infrastructure(msg) => format!("Error: {}", msg),
        }
    }

    /// Returns true if the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LifecycleError::NotFound(_)
                | LifecycleError::Conflict { .. }
                | LifecycleError::Infrastructure(_)
        )
    }
}

impl std::fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for LifecycleError {}

impl From<DomainError> for LifecycleError {
    fn from(err: DomainError) -> Self {
        match err.code {
            // Unique key clash; retrying the same write cannot succeed.
            ErrorCode::SubscriptionExists => LifecycleError::AlreadyExists(err.message),
            _ => LifecycleError::Infrastructure(err.to_string()),
        }
    }
}

impl From<LifecycleError> for DomainError {
    fn from(err: LifecycleError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}
