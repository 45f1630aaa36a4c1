//! Subscription store connection settings.
//!
//! The URL is optional: leaving `DATABASE__URL` unset runs the service on the
//! in-memory adapters, which is only accepted outside production.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

const SCHEMES: [&str; 2] = ["postgres://", "postgresql://"];

/// PostgreSQL settings for the subscription, event-log and token tables.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL. Carries credentials, so it is kept secret.
    #[serde(default)]
    pub url: Option<SecretString>,

    #[serde(default)]
    pub pool: PoolConfig,

    /// Server-side cap on a single statement, in milliseconds. Sweeps and
    /// compare-and-swap writes are short; anything slower is a stuck lock.
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,

    /// Apply `migrations/` at startup
    #[serde(default)]
    pub run_migrations: bool,
}

/// Connection pool sizing. Seven sweep tasks and the HTTP handlers share it.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,

    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    #[serde(default = "default_max_lifetime_secs")]
    pub max_lifetime_secs: u64,
}

impl DatabaseConfig {
    /// The URL, if one is set and not blank.
    pub fn connection_url(&self) -> Option<&str> {
        self.url
            .as_ref()
            .map(|url| url.expose_secret().trim())
            .filter(|url| !url.is_empty())
    }

    pub fn is_configured(&self) -> bool {
        self.connection_url().is_some()
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let url = self
            .connection_url()
            .ok_or(ValidationError::MissingRequired("DATABASE__URL"))?;
        if !SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
            return Err(ValidationError::UnsupportedDatabaseScheme);
        }
        ValidationError::check_range(
            "DATABASE__STATEMENT_TIMEOUT_MS",
            self.statement_timeout_ms,
            100,
            60_000,
        )?;
        self.pool.validate()
    }
}

impl PoolConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::check_range(
            "DATABASE__POOL__MAX_CONNECTIONS",
            u64::from(self.max_connections),
            1,
            100,
        )?;
        if self.min_connections > self.max_connections {
            return Err(ValidationError::PoolBoundsInverted {
                min: self.min_connections,
                max: self.max_connections,
            });
        }
        ValidationError::check_range(
            "DATABASE__POOL__ACQUIRE_TIMEOUT_SECS",
            self.acquire_timeout_secs,
            1,
            120,
        )
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool: PoolConfig::default(),
            statement_timeout_ms: default_statement_timeout_ms(),
            run_migrations: false,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            max_lifetime_secs: default_max_lifetime_secs(),
        }
    }
}

fn default_statement_timeout_ms() -> u64 {
    5_000
}

fn default_min_connections() -> u32 {
    2
}

fn default_max_connections() -> u32 {
    16
}

fn default_acquire_timeout_secs() -> u64 {
    10
}

fn default_idle_timeout_secs() -> u64 {
    600
}

fn default_max_lifetime_secs() -> u64 {
    1800
}
