//! PostgreSQL implementation of AccessTokenService.
//!
//! A partial unique index keeps at most one active token per subscriber.
//! Revoked tokens are never reactivated; activation after a revoke issues a
//! fresh token.

use crate::domain::foundation::{DomainError, SubscriberId};
use crate::ports::AccessTokenService;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

const ONE_ACTIVE_INDEX: &str = "idx_access_tokens_one_active";

pub struct PostgresAccessTokens {
    pool: PgPool,
}

impl PostgresAccessTokens {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(action: &str, e: sqlx::Error) -> DomainError {
    DomainError::database(format!("Failed to {} access token: {}", action, e))
}

#[async_trait]
impl AccessTokenService for PostgresAccessTokens {
    async fn activate(&self, subscriber_id: &SubscriberId) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(|e| db_error("activate", e))?;

        let restored = sqlx::query(
            r#"
            UPDATE access_tokens SET state = 'active', updated_at = NOW()
            WHERE id = (
                SELECT id FROM access_tokens
                WHERE subscriber_id = $1 AND state = 'suspended'
                ORDER BY created_at DESC
                LIMIT 1
            )
            AND NOT EXISTS (
                SELECT 1 FROM access_tokens WHERE subscriber_id = $1 AND state = 'active'
            )
            "#,
        )
        .bind(subscriber_id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("activate", e))?;

        if restored.rows_affected() == 0 {
            let inserted = sqlx::query(
                r#"
                INSERT INTO access_tokens (id, subscriber_id, state)
                SELECT $1, $2, 'active'
                WHERE NOT EXISTS (
                    SELECT 1 FROM access_tokens WHERE subscriber_id = $2 AND state = 'active'
                )
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(subscriber_id.as_str())
            .execute(&mut *tx)
            .await;

            if let Err(e) = inserted {
                // A concurrent activation won the race; the subscriber has
                // exactly one active token either way.
                let lost_race = matches!(
                    &e,
                    sqlx::Error::Database(db_err) if db_err.constraint() == Some(ONE_ACTIVE_INDEX)
                );
                if lost_race {
                    return Ok(());
                }
                return Err(db_error("activate", e));
            }
        }

        tx.commit().await.map_err(|e| db_error("activate", e))?;
        Ok(())
    }

    async fn suspend(&self, subscriber_id: &SubscriberId) -> Result<(), DomainError> {
        sqlx::query(
            "UPDATE access_tokens SET state = 'suspended', updated_at = NOW() \
             WHERE subscriber_id = $1 AND state = 'active'",
        )
        .bind(subscriber_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("suspend", e))?;
        Ok(())
    }

    async fn revoke(&self, subscriber_id: &SubscriberId) -> Result<(), DomainError> {
        sqlx::query(
            "UPDATE access_tokens SET state = 'revoked', updated_at = NOW() \
             WHERE subscriber_id = $1 AND state IN ('active', 'suspended')",
        )
        .bind(subscriber_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("revoke", e))?;
        Ok(())
    }
}
