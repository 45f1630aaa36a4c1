//! PostgreSQL implementation of SubscriptionStore.
//!
//! Compare-and-swap is a single conditional UPDATE; Postgres row locking
//! serializes concurrent writers and the loser sees zero rows affected.

use crate::domain::foundation::{
    DomainError, ErrorCode, SubscriberId, SubscriptionId, Timestamp,
};
use crate::domain::subscription::{Precondition, Subscription};
use crate::ports::{CasOutcome, DueCondition, OutreachQuery, SubscriptionStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const SELECT_COLUMNS: &str = r#"
    id, subscriber_id, plan_id, billing_period, status,
    is_trial, trial_start, trial_end, trial_converted_at,
    current_period_start, current_period_end,
    dunning_count, dunning_next_retry_at,
    paused_at, pause_resumes_at,
    cancel_at_period_end, canceled_at,
    provider_subscription_id, provider_customer_id,
    version, created_at, updated_at
"#;

/// PostgreSQL implementation of the SubscriptionStore port.
pub struct PostgresSubscriptionStore {
    pool: PgPool,
}

impl PostgresSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(
        &self,
        column: &str,
        value: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        let sql = format!("SELECT {} FROM subscriptions WHERE {} = $1", SELECT_COLUMNS, column);
        let row: Option<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("load subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }
}

/// Database row representation of a subscription.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    subscriber_id: String,
    plan_id: String,
    billing_period: String,
    status: String,
    is_trial: bool,
    trial_start: Option<DateTime<Utc>>,
    trial_end: Option<DateTime<Utc>>,
    trial_converted_at: Option<DateTime<Utc>>,
    current_period_start: Option<DateTime<Utc>>,
    current_period_end: Option<DateTime<Utc>>,
    dunning_count: i16,
    dunning_next_retry_at: Option<DateTime<Utc>>,
    paused_at: Option<DateTime<Utc>>,
    pause_resumes_at: Option<DateTime<Utc>>,
    cancel_at_period_end: bool,
    canceled_at: Option<DateTime<Utc>>,
    provider_subscription_id: Option<String>,
    provider_customer_id: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let corrupt = |field: &str, e: &dyn std::fmt::Display| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid {} in subscription {}: {}", field, row.id, e),
            )
        };
        let ts = |dt: Option<DateTime<Utc>>| dt.map(Timestamp::from_datetime);

        Ok(Subscription {
            id: SubscriptionId::from_uuid(row.id),
            subscriber_id: SubscriberId::new(row.subscriber_id.clone())
                .map_err(|e| corrupt("subscriber_id", &e))?,
            plan_id: row.plan_id.clone(),
            billing_period: row
                .billing_period
                .parse()
                .map_err(|e| corrupt("billing_period", &e))?,
            status: row.status.parse().map_err(|e| corrupt("status", &e))?,
            is_trial: row.is_trial,
            trial_start: ts(row.trial_start),
            trial_end: ts(row.trial_end),
            trial_converted_at: ts(row.trial_converted_at),
            current_period_start: ts(row.current_period_start),
            current_period_end: ts(row.current_period_end),
            dunning_count: u8::try_from(row.dunning_count)
                .map_err(|e| corrupt("dunning_count", &e))?,
            dunning_next_retry_at: ts(row.dunning_next_retry_at),
            paused_at: ts(row.paused_at),
            pause_resumes_at: ts(row.pause_resumes_at),
            cancel_at_period_end: row.cancel_at_period_end,
            canceled_at: ts(row.canceled_at),
            provider_subscription_id: row.provider_subscription_id.clone(),
            provider_customer_id: row.provider_customer_id.clone(),
            version: row.version,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn dt(ts: Option<Timestamp>) -> Option<DateTime<Utc>> {
    ts.map(|t| *t.as_datetime())
}

fn db_error(action: &str, e: sqlx::Error) -> DomainError {
    DomainError::database(format!("Failed to {}: {}", action, e))
}

fn violates_unique_key(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => matches!(
            db_err.constraint(),
            Some("subscriptions_subscriber_id_key")
                | Some("subscriptions_provider_subscription_id_key")
        ),
        _ => false,
    }
}

#[async_trait]
impl SubscriptionStore for PostgresSubscriptionStore {
    async fn insert(&self, s: &Subscription) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, subscriber_id, plan_id, billing_period, status,
                is_trial, trial_start, trial_end, trial_converted_at,
                current_period_start, current_period_end,
                dunning_count, dunning_next_retry_at,
                paused_at, pause_resumes_at,
                cancel_at_period_end, canceled_at,
                provider_subscription_id, provider_customer_id,
                version, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22
            )
            "#,
        )
        .bind(s.id.as_uuid())
        .bind(s.subscriber_id.as_str())
        .bind(&s.plan_id)
        .bind(s.billing_period.as_str())
        .bind(s.status.as_str())
        .bind(s.is_trial)
        .bind(dt(s.trial_start))
        .bind(dt(s.trial_end))
        .bind(dt(s.trial_converted_at))
        .bind(dt(s.current_period_start))
        .bind(dt(s.current_period_end))
        .bind(i16::from(s.dunning_count))
        .bind(dt(s.dunning_next_retry_at))
        .bind(dt(s.paused_at))
        .bind(dt(s.pause_resumes_at))
        .bind(s.cancel_at_period_end)
        .bind(dt(s.canceled_at))
        .bind(&s.provider_subscription_id)
        .bind(&s.provider_customer_id)
        .bind(s.version)
        .bind(s.created_at.as_datetime())
        .bind(s.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if violates_unique_key(&e) {
                return DomainError::new(
                    ErrorCode::SubscriptionExists,
                    "Subscriber already has a subscription",
                );
            }
            db_error("insert subscription", e)
        })?;

        Ok(())
    }

    async fn load(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        let sql = format!("SELECT {} FROM subscriptions WHERE id = $1", SELECT_COLUMNS);
        let row: Option<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("load subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn load_by_subscriber_id(
        &self,
        subscriber_id: &SubscriberId,
    ) -> Result<Option<Subscription>, DomainError> {
        self.fetch_one_where("subscriber_id", subscriber_id.as_str())
            .await
    }

    async fn load_by_provider_subscription_id(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        self.fetch_one_where("provider_subscription_id", provider_subscription_id)
            .await
    }

    async fn compare_and_swap(
        &self,
        expected: Precondition,
        next: &Subscription,
    ) -> Result<CasOutcome, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET
                plan_id = $4,
                billing_period = $5,
                status = $6,
                is_trial = $7,
                trial_start = $8,
                trial_end = $9,
                trial_converted_at = $10,
                current_period_start = $11,
                current_period_end = $12,
                dunning_count = $13,
                dunning_next_retry_at = $14,
                paused_at = $15,
                pause_resumes_at = $16,
                cancel_at_period_end = $17,
                canceled_at = $18,
                provider_subscription_id = $19,
                provider_customer_id = $20,
                version = $21,
                updated_at = $22
            WHERE id = $1 AND status = $2 AND version = $3
            "#,
        )
        .bind(next.id.as_uuid())
        .bind(expected.status.as_str())
        .bind(expected.version)
        .bind(&next.plan_id)
        .bind(next.billing_period.as_str())
        .bind(next.status.as_str())
        .bind(next.is_trial)
        .bind(dt(next.trial_start))
        .bind(dt(next.trial_end))
        .bind(dt(next.trial_converted_at))
        .bind(dt(next.current_period_start))
        .bind(dt(next.current_period_end))
        .bind(i16::from(next.dunning_count))
        .bind(dt(next.dunning_next_retry_at))
        .bind(dt(next.paused_at))
        .bind(dt(next.pause_resumes_at))
        .bind(next.cancel_at_period_end)
        .bind(dt(next.canceled_at))
        .bind(&next.provider_subscription_id)
        .bind(&next.provider_customer_id)
        .bind(next.version)
        .bind(next.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if violates_unique_key(&e) {
                return DomainError::new(
                    ErrorCode::SubscriptionExists,
                    "Provider subscription id is already linked to another subscriber",
                );
            }
            db_error("update subscription", e)
        })?;

        if result.rows_affected() == 1 {
            Ok(CasOutcome::Applied)
        } else {
            Ok(CasOutcome::Conflict)
        }
    }

    async fn find_due(
        &self,
        condition: DueCondition,
        now: Timestamp,
        limit: u32,
    ) -> Result<Vec<Subscription>, DomainError> {
        let column = match condition {
            DueCondition::TrialWindow => "trial_end",
            DueCondition::DunningRetry => "dunning_next_retry_at",
            DueCondition::PauseWindow => "pause_resumes_at",
        };
        let sql = format!(
            "SELECT {cols} FROM subscriptions WHERE status = $1 AND {col} <= $2 ORDER BY {col} ASC LIMIT $3",
            cols = SELECT_COLUMNS,
            col = column
        );

        let rows: Vec<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(condition.status().as_str())
            .bind(now.as_datetime())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("scan due subscriptions", e))?;

        rows.into_iter().map(Subscription::try_from).collect()
    }

    async fn find_for_outreach(
        &self,
        query: OutreachQuery,
        limit: u32,
    ) -> Result<Vec<Subscription>, DomainError> {
        let (filter, from, to) = match query {
            OutreachQuery::TrialEndingBetween { from, to } => (
                "status = 'trialing' AND trial_end > $1 AND trial_end <= $2",
                from,
                to,
            ),
            OutreachQuery::CreatedBetween { from, to } => (
                "status IN ('active', 'trialing') AND created_at > $1 AND created_at <= $2",
                from,
                to,
            ),
            OutreachQuery::LapsedBetween { from, to } => (
                "(status = 'canceled' AND canceled_at > $1 AND canceled_at <= $2) \
                 OR (status = 'trial_expired' AND trial_end > $1 AND trial_end <= $2)",
                from,
                to,
            ),
        };
        let sql = format!(
            "SELECT {} FROM subscriptions WHERE {} ORDER BY created_at ASC LIMIT $3",
            SELECT_COLUMNS, filter
        );

        let rows: Vec<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(from.as_datetime())
            .bind(to.as_datetime())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("scan outreach subscriptions", e))?;

        rows.into_iter().map(Subscription::try_from).collect()
    }
}
