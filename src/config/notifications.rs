//! Notification service configuration

use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Notification service configuration. With no base URL, notifications are
/// logged instead of delivered.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Base URL of the notification service
    #[serde(default)]
    pub base_url: Option<String>,

    /// Bearer token for the notification service
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl NotificationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate notification configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(url) = &self.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ValidationError::InvalidUrl("NOTIFICATIONS__BASE_URL"));
            }
        }
        ValidationError::check_range("NOTIFICATIONS__TIMEOUT_SECS", self.timeout_secs, 1, 60)
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    5
}
