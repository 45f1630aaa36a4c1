//! PostgreSQL adapters - Database implementations for persistence ports.
//!
//! - `PostgresSubscriptionStore` - Subscription records, compare-and-swap writes
//! - `PostgresProcessedEventLog` - Webhook event claims with lease recovery
//! - `PostgresAccessTokens` - One active token per subscriber

mod access_tokens;
mod processed_event_log;
mod subscription_store;

pub use access_tokens::PostgresAccessTokens;
pub use processed_event_log::PostgresProcessedEventLog;
pub use subscription_store::PostgresSubscriptionStore;

use std::str::FromStr;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};

use crate::config::DatabaseConfig;
use crate::domain::foundation::DomainError;

/// Open a connection pool sized from configuration. Every session gets the
/// configured `statement_timeout`.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, DomainError> {
    let url = config
        .connection_url()
        .ok_or_else(|| DomainError::database("No database URL configured"))?;
    let options = PgConnectOptions::from_str(url)
        .map_err(|e| DomainError::database(format!("Invalid database URL: {}", e)))?
        .options([(
            "statement_timeout",
            config.statement_timeout().as_millis().to_string(),
        )]);

    let pool = &config.pool;
    PgPoolOptions::new()
        .min_connections(pool.min_connections)
        .max_connections(pool.max_connections)
        .acquire_timeout(pool.acquire_timeout())
        .idle_timeout(pool.idle_timeout())
        .max_lifetime(pool.max_lifetime())
        .connect_with(options)
        .await
        .map_err(|e| DomainError::database(format!("Failed to connect to database: {}", e)))
}

/// Apply the SQL migrations under `migrations/`.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DomainError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to run migrations: {}", e)))
}
