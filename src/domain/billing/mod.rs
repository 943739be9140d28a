//! Billing domain: webhook verification, event decoding, and entitlement
//! reconciliation.

mod entitlement;
mod errors;
mod event;
mod reconciler;
mod signature;

pub use entitlement::{Entitlement, EntitlementStatus};
pub use errors::WebhookError;
pub use event::{CheckoutSessionObject, EventData, EventKind, ProviderEvent, SubscriptionObject};
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use signature::{SignatureHeader, WebhookVerifier, DEFAULT_TOLERANCE_SECS};

#[cfg(test)]
pub use signature::compute_test_signature;
