//! PostgreSQL implementation of ProcessedEventLog.
//!
//! Claims use `INSERT ... ON CONFLICT ... RETURNING` so exactly one concurrent
//! delivery wins. A stale unprocessed claim is taken over by the same
//! statement once its lease has run out.

use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{ClaimOutcome, ProcessedEventLog, CLAIM_LEASE_SECS};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

pub struct PostgresProcessedEventLog {
    pool: PgPool,
}

impl PostgresProcessedEventLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProcessedEventLog for PostgresProcessedEventLog {
    async fn try_claim(
        &self,
        event_id: &str,
        event_type: &str,
    ) -> Result<ClaimOutcome, DomainError> {
        let claimed: Option<(String,)> = sqlx::query_as(
            r#"
            INSERT INTO processed_events (event_id, event_type, claimed_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (event_id) DO UPDATE SET
                claimed_at = NOW(),
                event_type = EXCLUDED.event_type
            WHERE processed_events.processed_at IS NULL
              AND processed_events.claimed_at < NOW() - make_interval(secs => $3)
            RETURNING event_id
            "#,
        )
        .bind(event_id)
        .bind(event_type)
        .bind(CLAIM_LEASE_SECS as f64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to claim event: {}", e)))?;

        if claimed.is_some() {
            return Ok(ClaimOutcome::Claimed);
        }

        let processed_at: Option<(Option<DateTime<Utc>>,)> = sqlx::query_as(
            "SELECT processed_at FROM processed_events WHERE event_id = $1",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to read event claim: {}", e)))?;

        match processed_at {
            Some((Some(_),)) => Ok(ClaimOutcome::AlreadyProcessed),
            // Held by another delivery, or released between the two statements.
            _ => Ok(ClaimOutcome::InFlight),
        }
    }

    async fn mark_processed(&self, event_id: &str) -> Result<(), DomainError> {
        sqlx::query("UPDATE processed_events SET processed_at = NOW() WHERE event_id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to mark event processed: {}", e)))?;
        Ok(())
    }

    async fn release(&self, event_id: &str) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM processed_events WHERE event_id = $1 AND processed_at IS NULL")
            .bind(event_id)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to release event claim: {}", e)))?;
        Ok(())
    }

    async fn delete_processed_before(&self, before: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query(
            "DELETE FROM processed_events WHERE processed_at IS NOT NULL AND processed_at < $1",
        )
        .bind(before.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to prune processed events: {}", e)))?;

        Ok(result.rows_affected())
    }
}
