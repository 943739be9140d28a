//! In-memory entitlement store.
//!
//! Mirrors the Postgres adapter's semantics, including compare-and-swap
//! conflicts and the duplicate-customer inconsistency check, so pipeline
//! tests exercise the same paths the production store takes.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::billing::Entitlement;
use crate::domain::foundation::AccountId;
use crate::ports::{EntitlementStore, StoreError};

#[derive(Default)]
pub struct InMemoryEntitlementStore {
    records: RwLock<HashMap<AccountId, Entitlement>>,
}

impl InMemoryEntitlementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record directly, bypassing compare-and-swap. Fixture
    /// setup only; production records are written through the port.
    pub fn seed(&self, record: Entitlement) {
        self.records
            .write()
            .expect("entitlement store lock poisoned")
            .insert(record.account_id, record);
    }

    /// Reads a record directly for assertions.
    pub fn snapshot(&self, account_id: AccountId) -> Option<Entitlement> {
        self.records
            .read()
            .expect("entitlement store lock poisoned")
            .get(&account_id)
            .cloned()
    }
}

#[async_trait]
impl EntitlementStore for InMemoryEntitlementStore {
    async fn find_by_account_id(
        &self,
        account_id: AccountId,
    ) -> Result<Option<Entitlement>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(records.get(&account_id).cloned())
    }

    async fn find_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<Entitlement>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        let mut matches = records
            .values()
            .filter(|r| r.provider_customer_id.as_deref() == Some(customer_id));

        let first = matches.next().cloned();
        if first.is_some() && matches.next().is_some() {
            return Err(StoreError::Inconsistent(format!(
                "multiple entitlements claim customer {customer_id}"
            )));
        }
        Ok(first)
    }

    async fn compare_and_swap(
        &self,
        record: &Entitlement,
        expected_last_event_id: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        let Some(current) = records.get(&record.account_id) else {
            return Err(StoreError::Conflict);
        };
        if current.last_event_id.as_deref() != expected_last_event_id {
            return Err(StoreError::Conflict);
        }

        records.insert(record.account_id, record.clone());
        Ok(())
    }
}
