//! Lifecycle policy configuration: trial length, retry bounds, sweep cadence.

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    /// Length of a new trial in days
    #[serde(default = "default_trial_days")]
    pub trial_days: i64,

    /// Compare-and-swap attempts before a write is reported as conflicting
    #[serde(default = "default_max_cas_attempts")]
    pub max_cas_attempts: u32,

    /// Records processed per sweep iteration
    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: u32,

    /// Interval between iterations of each sweep, in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Days before `trial_end` the trial-ending-soon notice goes out
    #[serde(default = "default_trial_ending_soon_lead_days")]
    pub trial_ending_soon_lead_days: i64,

    /// Days after creation each onboarding message is sent
    #[serde(default = "default_onboarding_days")]
    pub onboarding_days: Vec<u32>,

    /// Win-back window start, in days after cancellation or expiry
    #[serde(default = "default_win_back_min_days")]
    pub win_back_min_days: i64,

    /// Win-back window end, in days after cancellation or expiry
    #[serde(default = "default_win_back_max_days")]
    pub win_back_max_days: i64,

    /// Processed webhook events older than this are pruned
    #[serde(default = "default_processed_event_retention_days")]
    pub processed_event_retention_days: i64,
}

impl LifecycleConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Validate lifecycle configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.trial_days <= 0 {
            return Err(ValidationError::InvalidLifecycle("trial_days must be positive"));
        }
        if self.max_cas_attempts == 0 {
            return Err(ValidationError::InvalidLifecycle(
                "max_cas_attempts must be at least 1",
            ));
        }
        if self.sweep_batch_size == 0 {
            return Err(ValidationError::InvalidLifecycle(
                "sweep_batch_size must be at least 1",
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ValidationError::InvalidLifecycle(
                "sweep_interval_secs must be positive",
            ));
        }
        if self.trial_ending_soon_lead_days <= 0 {
            return Err(ValidationError::InvalidLifecycle(
                "trial_ending_soon_lead_days must be positive",
            ));
        }
        if self.win_back_min_days < 0 || self.win_back_min_days >= self.win_back_max_days {
            return Err(ValidationError::InvalidLifecycle(
                "win-back window must satisfy 0 <= min < max",
            ));
        }
        if self.processed_event_retention_days <= 0 {
            return Err(ValidationError::InvalidLifecycle(
                "processed_event_retention_days must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            trial_days: default_trial_days(),
            max_cas_attempts: default_max_cas_attempts(),
            sweep_batch_size: default_sweep_batch_size(),
            sweep_interval_secs: default_sweep_interval(),
            trial_ending_soon_lead_days: default_trial_ending_soon_lead_days(),
            onboarding_days: default_onboarding_days(),
            win_back_min_days: default_win_back_min_days(),
            win_back_max_days: default_win_back_max_days(),
            processed_event_retention_days: default_processed_event_retention_days(),
        }
    }
}

fn default_trial_days() -> i64 {
    14
}

fn default_max_cas_attempts() -> u32 {
    3
}

fn default_sweep_batch_size() -> u32 {
    100
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_trial_ending_soon_lead_days() -> i64 {
    3
}

fn default_onboarding_days() -> Vec<u32> {
    vec![1, 3, 7]
}

fn default_win_back_min_days() -> i64 {
    7
}

fn default_win_back_max_days() -> i64 {
    30
}

fn default_processed_event_retention_days() -> i64 {
    30
}
