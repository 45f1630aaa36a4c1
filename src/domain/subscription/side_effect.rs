//! Side effects requested by a transition.
//!
//! The engine only describes them; the dispatcher runs them after the status
//! write has committed. None of them can roll a transition back.

use serde::{Deserialize, Serialize};

/// One action against an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SideEffect {
    /// Make the subscriber's access token active.
    ActivateAccess,

    /// Deactivate the access token; it can be re-activated later.
    SuspendAccess,

    /// Permanently deactivate the access token.
    RevokeAccess,

    /// Send a lifecycle notification.
    Notify(NotificationTemplate),

    /// Cancel the provider subscription, now or at period end.
    ProviderCancel { at_period_end: bool },

    /// Ask the provider to retry the latest open invoice.
    ProviderRetryInvoice,

    /// Ask the provider to stop collecting payments.
    ProviderPauseCollection,

    /// Ask the provider to resume collecting payments.
    ProviderResumeCollection,
}

impl SideEffect {
    pub fn name(&self) -> &'static str {
        match self {
            SideEffect::ActivateAccess => "activate_access",
            SideEffect::SuspendAccess => "suspend_access",
            SideEffect::RevokeAccess => "revoke_access",
            SideEffect::Notify(_) => "notify",
            SideEffect::ProviderCancel { .. } => "provider_cancel",
            SideEffect::ProviderRetryInvoice => "provider_retry_invoice",
            SideEffect::ProviderPauseCollection => "provider_pause_collection",
            SideEffect::ProviderResumeCollection => "provider_resume_collection",
        }
    }

    /// Returns true if the effect calls back into the payment provider.
    pub fn targets_provider(&self) -> bool {
        matches!(
            self,
            SideEffect::ProviderCancel { .. }
                | SideEffect::ProviderRetryInvoice
                | SideEffect::ProviderPauseCollection
                | SideEffect::ProviderResumeCollection
        )
    }
}

/// Notification templates, lifecycle and outreach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "template", rename_all = "snake_case")]
pub enum NotificationTemplate {
    TrialEnded,
    DunningNotice { attempt: u8 },
    FinalNotice,
    WelcomeBack,
    TrialEndingSoon,
    Onboarding { day: u32 },
    WinBack,
}

impl NotificationTemplate {
    /// Deduplication key. Together with the subscriber it identifies a
    /// notification that must be delivered at most once.
    pub fn key(&self) -> String {
        match self {
            NotificationTemplate::TrialEnded => "trial_ended".to_string(),
            NotificationTemplate::DunningNotice { attempt } => format!("dunning_notice_{}", attempt),
            NotificationTemplate::FinalNotice => "final_notice".to_string(),
            NotificationTemplate::WelcomeBack => "welcome_back".to_string(),
            NotificationTemplate::TrialEndingSoon => "trial_ending_soon".to_string(),
            NotificationTemplate::Onboarding { day } => format!("onboarding_day_{}", day),
            NotificationTemplate::WinBack => "win_back".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dunning_keys_are_distinct_per_attempt() {
        let first = NotificationTemplate::DunningNotice { attempt: 1 }.key();
        let second = NotificationTemplate::DunningNotice { attempt: 2 }.key();
        assert_ne!(first, second);
        assert_eq!(first, "dunning_notice_1");
    }

    #[test]
    fn onboarding_key_includes_day() {
        assert_eq!(NotificationTemplate::Onboarding { day: 7 }.key(), "onboarding_day_7");
    }

    #[test]
    fn provider_effects_are_flagged() {
        assert!(SideEffect::ProviderRetryInvoice.targets_provider());
        assert!(SideEffect::ProviderCancel { at_period_end: true }.targets_provider());
        assert!(!SideEffect::SuspendAccess.targets_provider());
        assert!(!SideEffect::Notify(NotificationTemplate::FinalNotice).targets_provider());
    }
}
