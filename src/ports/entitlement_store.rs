//! Entitlement store port.
//!
//! The reconciliation engine depends on this trait; adapters provide the
//! Postgres implementation for production and an in-memory one for tests.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::billing::Entitlement;
use crate::domain::foundation::AccountId;

/// Failures surfaced by entitlement store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The compare-and-swap precondition no longer held; the caller should
    /// re-read and retry.
    #[error("concurrent update detected")]
    Conflict,

    /// The store's data violates a uniqueness assumption (for example two
    /// records claiming the same provider customer). Not retryable.
    #[error("store inconsistency: {0}")]
    Inconsistent(String),

    /// The store could not be reached or the query failed.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The operation exceeded its deadline.
    #[error("store operation timed out")]
    Timeout,
}

impl StoreError {
    /// Returns true if retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Conflict | StoreError::Unavailable(_) | StoreError::Timeout
        )
    }
}

/// Persistence port for entitlement records.
///
/// `compare_and_swap` is the only mutation: the write succeeds only if the
/// stored `last_event_id` still equals `expected_last_event_id`, which
/// serializes concurrent webhook deliveries touching the same record.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// Looks up the record by local account id.
    async fn find_by_account_id(
        &self,
        account_id: AccountId,
    ) -> Result<Option<Entitlement>, StoreError>;

    /// Looks up the record by provider customer id.
    ///
    /// Returns `Inconsistent` if more than one record matches.
    async fn find_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<Entitlement>, StoreError>;

    /// Writes the full record if its stored `last_event_id` still equals
    /// `expected_last_event_id`; returns `Conflict` otherwise.
    async fn compare_and_swap(
        &self,
        record: &Entitlement,
        expected_last_event_id: Option<&str>,
    ) -> Result<(), StoreError>;
}
