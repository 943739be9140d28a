//! PostgreSQL implementation of EntitlementStore.
//!
//! Provides persistent storage for entitlement records using PostgreSQL.
//! The compare-and-swap is a conditional UPDATE keyed on the stored
//! `last_event_id`; zero rows affected means another writer got there first.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{Entitlement, EntitlementStatus};
use crate::domain::foundation::AccountId;
use crate::ports::{EntitlementStore, StoreError};

const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// PostgreSQL implementation of the EntitlementStore port.
///
/// Uses sqlx for type-safe database operations with connection pooling.
pub struct PostgresEntitlementStore {
    pool: PgPool,
    query_timeout: Duration,
}

impl PostgresEntitlementStore {
    /// Creates a new PostgresEntitlementStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Overrides the per-query deadline.
    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    async fn with_deadline<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, sqlx::Error>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result.map_err(map_sqlx_error),
            Err(_) => Err(StoreError::Timeout),
        }
    }
}

/// Database row representation of an entitlement.
#[derive(Debug, sqlx::FromRow)]
struct EntitlementRow {
    account_id: Uuid,
    provider_customer_id: Option<String>,
    provider_subscription_id: Option<String>,
    is_entitled: bool,
    status: String,
    last_event_id: Option<String>,
    last_event_at: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EntitlementRow> for Entitlement {
    type Error = StoreError;

    fn try_from(row: EntitlementRow) -> Result<Self, Self::Error> {
        let status = EntitlementStatus::parse(&row.status).ok_or_else(|| {
            StoreError::Inconsistent(format!(
                "unknown status value {:?} for account {}",
                row.status, row.account_id
            ))
        })?;

        Ok(Entitlement {
            account_id: AccountId::from_uuid(row.account_id),
            provider_customer_id: row.provider_customer_id,
            provider_subscription_id: row.provider_subscription_id,
            is_entitled: row.is_entitled,
            status,
            last_event_id: row.last_event_id,
            last_event_at: row.last_event_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn map_sqlx_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.constraint() == Some("entitlements_provider_customer_id_key") {
            return StoreError::Inconsistent(
                "provider customer already claimed by another account".to_string(),
            );
        }
    }
    StoreError::Unavailable(e.to_string())
}

const SELECT_COLUMNS: &str = "account_id, provider_customer_id, provider_subscription_id, \
     is_entitled, status, last_event_id, last_event_at, created_at, updated_at";

#[async_trait]
impl EntitlementStore for PostgresEntitlementStore {
    async fn find_by_account_id(
        &self,
        account_id: AccountId,
    ) -> Result<Option<Entitlement>, StoreError> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM entitlements WHERE account_id = $1"
        );

        let row: Option<EntitlementRow> = self
            .with_deadline(
                sqlx::query_as(&query)
                    .bind(account_id.as_uuid())
                    .fetch_optional(&self.pool),
            )
            .await?;

        row.map(Entitlement::try_from).transpose()
    }

    async fn find_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<Entitlement>, StoreError> {
        // fetch_all so that a uniqueness violation in the data is detected
        // instead of silently picking one of the candidates.
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM entitlements WHERE provider_customer_id = $1"
        );

        let rows: Vec<EntitlementRow> = self
            .with_deadline(sqlx::query_as(&query).bind(customer_id).fetch_all(&self.pool))
            .await?;

        if rows.len() > 1 {
            return Err(StoreError::Inconsistent(format!(
                "multiple entitlements claim customer {customer_id}"
            )));
        }

        rows.into_iter().next().map(Entitlement::try_from).transpose()
    }

    async fn compare_and_swap(
        &self,
        record: &Entitlement,
        expected_last_event_id: Option<&str>,
    ) -> Result<(), StoreError> {
        // IS NOT DISTINCT FROM treats NULL = NULL as a match, so the swap
        // also guards the first write to a fresh record.
        let result = self
            .with_deadline(
                sqlx::query(
                    r#"
                    UPDATE entitlements SET
                        provider_customer_id = $2,
                        provider_subscription_id = $3,
                        is_entitled = $4,
                        status = $5,
                        last_event_id = $6,
                        last_event_at = $7,
                        updated_at = $8
                    WHERE account_id = $1
                      AND last_event_id IS NOT DISTINCT FROM $9
                    "#,
                )
                .bind(record.account_id.as_uuid())
                .bind(&record.provider_customer_id)
                .bind(&record.provider_subscription_id)
                .bind(record.is_entitled)
                .bind(record.status.as_str())
                .bind(&record.last_event_id)
                .bind(record.last_event_at)
                .bind(record.updated_at)
                .bind(expected_last_event_id)
                .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }

        Ok(())
    }
}
