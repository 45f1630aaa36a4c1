//! Subscription status state machine.
//!
//! Closed set of statuses a subscription can be persisted in, plus the graph
//! of legal moves between them.

use crate::domain::foundation::{StateMachine, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Subscription lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Free trial running; access granted until `trial_end`.
    Trialing,

    /// Paid and current.
    Active,

    /// A payment failed and dunning retries are in progress. No access.
    PastDue,

    /// Dunning exhausted. No access; provider cancellation requested.
    Suspended,

    /// Collection paused by the subscriber; resumes at `pause_resumes_at`.
    Paused,

    /// Subscription ended. No access.
    Canceled,

    /// Trial ran out without conversion. No access.
    TrialExpired,
}

impl SubscriptionStatus {
    /// Every status, in declaration order.
    pub const ALL: [SubscriptionStatus; 7] = [
        SubscriptionStatus::Trialing,
        SubscriptionStatus::Active,
        SubscriptionStatus::PastDue,
        SubscriptionStatus::Suspended,
        SubscriptionStatus::Paused,
        SubscriptionStatus::Canceled,
        SubscriptionStatus::TrialExpired,
    ];

    /// Returns true if the subscriber's access token must be active.
    pub fn grants_access(&self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::Trialing)
    }

    /// Returns true if a non-zero dunning counter is allowed in this status.
    pub fn allows_dunning(&self) -> bool {
        matches!(self, SubscriptionStatus::PastDue | SubscriptionStatus::Suspended)
    }

    /// Persisted representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Suspended => "suspended",
            SubscriptionStatus::Paused => "paused",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::TrialExpired => "trial_expired",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SubscriptionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                ValidationError::invalid_format("status", format!("unknown status '{}'", s))
            })
    }
}

impl StateMachine for SubscriptionStatus {
    const STATES: &'static [Self] = &SubscriptionStatus::ALL;

    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            // From TRIALING
            (Trialing, Active)
                | (Trialing, TrialExpired)
                | (Trialing, Canceled)
            // From ACTIVE
                | (Active, Active) // Renewal, scheduled cancel, provider sync
                | (Active, PastDue)
                | (Active, Paused)
                | (Active, Canceled)
            // From PAST_DUE
                | (PastDue, PastDue) // Dunning retry
                | (PastDue, Active)
                | (PastDue, Suspended)
                | (PastDue, Canceled)
            // From SUSPENDED
                | (Suspended, Canceled)
            // From PAUSED
                | (Paused, Active)
                | (Paused, Canceled)
            // Resubscribe
                | (Canceled, Active)
                | (TrialExpired, Active)
        )
    }
}
