//! Ports (interfaces) that adapters implement.

mod entitlement_store;

pub use entitlement_store::{EntitlementStore, StoreError};
