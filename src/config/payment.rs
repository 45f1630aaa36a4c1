//! Payment provider configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Payment provider configuration (Stripe-compatible API)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Provider secret API key. Without one, provider callbacks go to a
    /// recording mock.
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// Webhook signing secret. Optional outside production.
    #[serde(default)]
    pub webhook_secret: Option<SecretString>,

    /// Provider API base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Timeout for each provider callback, in seconds
    #[serde(default = "default_callback_timeout")]
    pub callback_timeout_secs: u64,
}

impl PaymentConfig {
    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }

    /// Check if using provider test mode
    pub fn is_test_mode(&self) -> bool {
        self.api_key
            .as_ref()
            .map_or(false, |k| k.expose_secret().starts_with("sk_test_"))
    }

    /// Validate payment configuration
    pub fn validate(&self, production: bool) -> Result<(), ValidationError> {
        let blank = |s: &Option<SecretString>| {
            s.as_ref().map_or(true, |v| v.expose_secret().trim().is_empty())
        };

        if production && blank(&self.webhook_secret) {
            return Err(ValidationError::MissingRequired("PAYMENT__WEBHOOK_SECRET"));
        }
        if production && blank(&self.api_key) {
            return Err(ValidationError::MissingRequired("PAYMENT__API_KEY"));
        }
        if let Some(key) = &self.api_key {
            if !key.expose_secret().starts_with("sk_") {
                return Err(ValidationError::InvalidProviderKey);
            }
        }
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            return Err(ValidationError::InvalidUrl("PAYMENT__API_BASE_URL"));
        }
        ValidationError::check_range(
            "PAYMENT__CALLBACK_TIMEOUT_SECS",
            self.callback_timeout_secs,
            1,
            60,
        )
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            webhook_secret: None,
            api_base_url: default_api_base_url(),
            callback_timeout_secs: default_callback_timeout(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.stripe.com".to_string()
}

fn default_callback_timeout() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> Option<SecretString> {
        Some(SecretString::new(s.to_string()))
    }

    #[test]
    fn test_defaults_are_valid_outside_production() {
        let config = PaymentConfig::default();
        assert!(config.validate(false).is_ok());
        assert_eq!(config.callback_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_production_requires_webhook_secret() {
        let config = PaymentConfig {
            api_key: secret("sk_live_xxx"),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(true),
            Err(ValidationError::MissingRequired("PAYMENT__WEBHOOK_SECRET"))
        ));
    }

    #[test]
    fn test_production_rejects_blank_webhook_secret() {
        let config = PaymentConfig {
            api_key: secret("sk_live_xxx"),
            webhook_secret: secret("   "),
            ..Default::default()
        };
        assert!(config.validate(true).is_err());
    }

    #[test]
    fn test_validation_invalid_api_key_prefix() {
        let config = PaymentConfig {
            api_key: secret("pk_test_xxx"),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(false),
            Err(ValidationError::InvalidProviderKey)
        ));
    }

    #[test]
    fn test_is_test_mode() {
        let config = PaymentConfig {
            api_key: secret("sk_test_xxx"),
            ..Default::default()
        };
        assert!(config.is_test_mode());
        assert!(!PaymentConfig::default().is_test_mode());
    }

    #[test]
    fn test_validation_valid_production_config() {
        let config = PaymentConfig {
            api_key: secret("sk_live_abcd"),
            webhook_secret: secret("whsec_xyz"),
            ..Default::default()
        };
        assert!(config.validate(true).is_ok());
    }
}
