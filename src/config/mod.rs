//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `SUBSCRIPTION_CORE` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use subscription_core::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod error;
mod lifecycle;
mod notifications;
mod payment;
mod server;

pub use database::{DatabaseConfig, PoolConfig};
pub use error::{ConfigError, ValidationError};
pub use lifecycle::LifecycleConfig;
pub use notifications::NotificationConfig;
pub use payment::PaymentConfig;
pub use server::{Environment, LogFormat, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Every section has defaults, so an empty environment yields a development
/// setup backed by in-memory adapters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, logging)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection)
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Payment provider configuration
    #[serde(default)]
    pub payment: PaymentConfig,

    /// Notification service configuration
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Lifecycle policy (trial length, retries, sweeps)
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `SUBSCRIPTION_CORE` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `SUBSCRIPTION_CORE__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `SUBSCRIPTION_CORE__LIFECYCLE__ONBOARDING_DAYS=1,3,7` -> list
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("SUBSCRIPTION_CORE")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("lifecycle.onboarding_days"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// Production additionally requires a database and a webhook signing
    /// secret.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let production = self.is_production();

        self.server.validate()?;
        if production || self.database.is_configured() {
            self.database.validate()?;
        }
        self.payment.validate(production)?;
        self.notifications.validate()?;
        self.lifecycle.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "SUBSCRIPTION_CORE__DATABASE__URL",
        "SUBSCRIPTION_CORE__PAYMENT__API_KEY",
        "SUBSCRIPTION_CORE__PAYMENT__WEBHOOK_SECRET",
        "SUBSCRIPTION_CORE__SERVER__PORT",
        "SUBSCRIPTION_CORE__SERVER__ENVIRONMENT",
        "SUBSCRIPTION_CORE__LIFECYCLE__TRIAL_DAYS",
        "SUBSCRIPTION_CORE__LIFECYCLE__ONBOARDING_DAYS",
        "SUBSCRIPTION_CORE__DATABASE__POOL__MAX_CONNECTIONS",
        "SUBSCRIPTION_CORE__SERVER__LOG_FORMAT",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    fn set_production_env() {
        env::set_var("SUBSCRIPTION_CORE__SERVER__ENVIRONMENT", "production");
        env::set_var(
            "SUBSCRIPTION_CORE__DATABASE__URL",
            "postgresql://test@localhost/test",
        );
        env::set_var("SUBSCRIPTION_CORE__PAYMENT__API_KEY", "sk_live_xxx");
        env::set_var("SUBSCRIPTION_CORE__PAYMENT__WEBHOOK_SECRET", "whsec_xxx");
    }

    #[test]
    fn test_empty_environment_is_valid_development_config() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let config = AppConfig::load().unwrap();

        assert_eq!(config.server.environment, Environment::Development);
        assert!(!config.database.is_configured());
        assert!(config.payment.webhook_secret.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_production_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        set_production_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.is_production());
        assert_eq!(
            config.database.connection_url(),
            Some("postgresql://test@localhost/test")
        );
        assert_eq!(
            config
                .payment
                .webhook_secret
                .as_ref()
                .map(|s| s.expose_secret().clone()),
            Some("whsec_xxx".to_string())
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_without_webhook_secret_fails_validation() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        set_production_env();
        env::remove_var("SUBSCRIPTION_CORE__PAYMENT__WEBHOOK_SECRET");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_lifecycle_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("SUBSCRIPTION_CORE__LIFECYCLE__TRIAL_DAYS", "7");
        env::set_var("SUBSCRIPTION_CORE__LIFECYCLE__ONBOARDING_DAYS", "2,5");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.lifecycle.trial_days, 7);
        assert_eq!(config.lifecycle.onboarding_days, vec![2, 5]);
    }

    #[test]
    fn test_custom_server_port() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("SUBSCRIPTION_CORE__SERVER__PORT", "3000");
        let result = AppConfig::load();
        clear_env();

        assert_eq!(result.unwrap().server.port, 3000);
    }

    #[test]
    fn test_nested_pool_and_log_format() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("SUBSCRIPTION_CORE__DATABASE__POOL__MAX_CONNECTIONS", "8");
        env::set_var("SUBSCRIPTION_CORE__SERVER__LOG_FORMAT", "json");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.database.pool.max_connections, 8);
        assert_eq!(config.server.log_format, LogFormat::Json);
        assert!(config.server.json_logs());
    }
}
