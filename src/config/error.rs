//! Configuration error types

use thiserror::Error;

/// Failure to produce a usable [`AppConfig`](super::AppConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The environment could not be parsed into the typed sections.
    #[error("could not read configuration from the environment: {0}")]
    Load(#[from] config::ConfigError),

    /// The values parsed but describe a deployment we refuse to start.
    #[error("refusing to start: {0}")]
    Invalid(#[from] ValidationError),
}

/// A single rejected setting. Setting names are given in their environment
/// form without the `SUBSCRIPTION_CORE__` prefix.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} must be set")]
    MissingRequired(&'static str),

    #[error("{0} is not a bindable socket address")]
    InvalidBindAddress(String),

    #[error("{setting} must be between {min} and {max}")]
    OutOfRange {
        setting: &'static str,
        min: u64,
        max: u64,
    },

    #[error("DATABASE__URL must use the postgres:// or postgresql:// scheme")]
    UnsupportedDatabaseScheme,

    #[error("DATABASE__POOL__MIN_CONNECTIONS ({min}) exceeds DATABASE__POOL__MAX_CONNECTIONS ({max})")]
    PoolBoundsInverted { min: u32, max: u32 },

    #[error("PAYMENT__API_KEY must be a secret key (sk_...)")]
    InvalidProviderKey,

    #[error("{0} must be an http(s) URL")]
    InvalidUrl(&'static str),

    #[error("lifecycle policy: {0}")]
    InvalidLifecycle(&'static str),
}

impl ValidationError {
    /// Check `value` against an inclusive range, naming `setting` on failure.
    pub(crate) fn check_range(
        setting: &'static str,
        value: u64,
        min: u64,
        max: u64,
    ) -> Result<(), Self> {
        if (min..=max).contains(&value) {
            Ok(())
        } else {
            Err(Self::OutOfRange { setting, min, max })
        }
    }
}
