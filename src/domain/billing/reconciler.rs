//! Reconciliation engine.
//!
//! Applies a verified, decoded provider event to the entitlement store.
//! Deliveries are at-least-once and unordered, so before mutating anything
//! the engine checks the stored idempotency key (`last_event_id`) and
//! ordering key (`last_event_at`), then writes through a compare-and-swap
//! with bounded retry. The net effect is at-most-once application per
//! event regardless of redelivery or interleaving.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::domain::foundation::AccountId;
use crate::ports::{EntitlementStore, StoreError};

use super::errors::WebhookError;
use super::event::{CheckoutSessionObject, EventKind, ProviderEvent, SubscriptionObject};

const DEFAULT_MAX_ATTEMPTS: u32 = 4;
const BACKOFF_BASE_MS: u64 = 25;

/// What happened to a delivery. Every variant acknowledges with 200; the
/// distinction exists for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The event mutated the entitlement record.
    Applied,
    /// The event id was already recorded; redelivered duplicate.
    AlreadyApplied,
    /// A newer event had already been applied; this one was skipped.
    StaleSkipped,
    /// The event kind is not one this service acts on.
    Ignored,
    /// No entitlement record matched the event's lookup key.
    TargetNotFound,
}

/// Applies provider events to the entitlement store.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn EntitlementStore>,
    max_attempts: u32,
}

/// How the target record is looked up, decided by event kind.
enum Lookup {
    ByAccount(AccountId),
    ByCustomer(String),
}

/// The mutation to perform once the target record is in hand.
enum Mutation {
    Checkout {
        customer_id: String,
        subscription_id: String,
    },
    SubscriptionUpdate {
        status: String,
        subscription_id: Option<String>,
    },
    SubscriptionDeleted,
}

impl Reconciler {
    pub fn new(store: Arc<dyn EntitlementStore>) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    #[cfg(test)]
    fn with_max_attempts(store: Arc<dyn EntitlementStore>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts,
        }
    }

    /// Reconciles one decoded event against the store.
    ///
    /// Returns `Ok` for every acknowledgeable outcome; `Err` only for
    /// payload defects (missing fields) or persistence exhaustion.
    pub async fn reconcile(&self, event: &ProviderEvent) -> Result<ReconcileOutcome, WebhookError> {
        let (lookup, mutation) = match event.parsed_kind() {
            EventKind::CheckoutSessionCompleted => self.plan_checkout(event)?,
            EventKind::SubscriptionUpdated => self.plan_subscription_update(event)?,
            EventKind::SubscriptionDeleted => self.plan_subscription_deleted(event)?,
            EventKind::Other => {
                info!(event_id = %event.id, kind = %event.kind, "ignoring unhandled event kind");
                return Ok(ReconcileOutcome::Ignored);
            }
        };

        self.apply_with_retry(event, &lookup, &mutation).await
    }

    fn plan_checkout(&self, event: &ProviderEvent) -> Result<(Lookup, Mutation), WebhookError> {
        let session: CheckoutSessionObject = event
            .deserialize_object()
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;

        let reference = session
            .client_reference_id
            .ok_or(WebhookError::MissingField("client_reference_id"))?;
        let customer_id = session
            .customer
            .ok_or(WebhookError::MissingField("customer"))?;
        let subscription_id = session
            .subscription
            .ok_or(WebhookError::MissingField("subscription"))?;

        let account_id: AccountId = reference
            .parse()
            .map_err(|_| WebhookError::ParseError(format!("bad account reference: {reference}")))?;

        Ok((
            Lookup::ByAccount(account_id),
            Mutation::Checkout {
                customer_id,
                subscription_id,
            },
        ))
    }

    fn plan_subscription_update(
        &self,
        event: &ProviderEvent,
    ) -> Result<(Lookup, Mutation), WebhookError> {
        let sub: SubscriptionObject = event
            .deserialize_object()
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;

        let customer_id = sub.customer.ok_or(WebhookError::MissingField("customer"))?;
        let status = sub.status.ok_or(WebhookError::MissingField("status"))?;

        if sub.cancel_at_period_end {
            info!(
                event_id = %event.id,
                customer_id = %customer_id,
                "subscription scheduled to cancel at period end"
            );
        }

        Ok((
            Lookup::ByCustomer(customer_id),
            Mutation::SubscriptionUpdate {
                status,
                subscription_id: sub.id,
            },
        ))
    }

    fn plan_subscription_deleted(
        &self,
        event: &ProviderEvent,
    ) -> Result<(Lookup, Mutation), WebhookError> {
        let sub: SubscriptionObject = event
            .deserialize_object()
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;

        let customer_id = sub.customer.ok_or(WebhookError::MissingField("customer"))?;

        Ok((Lookup::ByCustomer(customer_id), Mutation::SubscriptionDeleted))
    }

    /// Read-check-mutate-swap loop.
    ///
    /// Each pass re-reads the record, re-runs the idempotency and ordering
    /// checks against fresh state, and attempts the swap. A conflict means
    /// another delivery won the race; the re-read then usually resolves to
    /// `AlreadyApplied` or `StaleSkipped` instead of a second write.
    async fn apply_with_retry(
        &self,
        event: &ProviderEvent,
        lookup: &Lookup,
        mutation: &Mutation,
    ) -> Result<ReconcileOutcome, WebhookError> {
        let mut last_failure: Option<StoreError> = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(BACKOFF_BASE_MS << attempt)).await;
            }

            let found = match self.find_target(lookup).await {
                Ok(found) => found,
                Err(StoreError::Inconsistent(detail)) => {
                    error!(event_id = %event.id, %detail, "entitlement store inconsistency");
                    return Ok(ReconcileOutcome::TargetNotFound);
                }
                Err(e) => {
                    warn!(event_id = %event.id, attempt, error = %e, "store read failed");
                    last_failure = Some(e);
                    continue;
                }
            };

            let Some(mut record) = found else {
                warn!(event_id = %event.id, kind = %event.kind, "no entitlement record for event");
                return Ok(ReconcileOutcome::TargetNotFound);
            };

            if record.last_event_id.as_deref() == Some(event.id.as_str()) {
                info!(event_id = %event.id, "event already applied");
                return Ok(ReconcileOutcome::AlreadyApplied);
            }

            if let Some(last_at) = record.last_event_at {
                if event.created < last_at {
                    info!(
                        event_id = %event.id,
                        event_created = event.created,
                        last_event_at = last_at,
                        "skipping event older than last applied"
                    );
                    return Ok(ReconcileOutcome::StaleSkipped);
                }
            }

            let expected = record.last_event_id.clone();

            match mutation {
                Mutation::Checkout {
                    customer_id,
                    subscription_id,
                } => record.apply_checkout(customer_id, subscription_id),
                Mutation::SubscriptionUpdate {
                    status,
                    subscription_id,
                } => record.apply_subscription_update(status, subscription_id.as_deref()),
                Mutation::SubscriptionDeleted => record.apply_subscription_deleted(),
            }
            record.record_event(event, Utc::now());

            match self
                .store
                .compare_and_swap(&record, expected.as_deref())
                .await
            {
                Ok(()) => {
                    info!(
                        event_id = %event.id,
                        kind = %event.kind,
                        account_id = %record.account_id,
                        is_entitled = record.is_entitled,
                        status = record.status.as_str(),
                        "entitlement reconciled"
                    );
                    return Ok(ReconcileOutcome::Applied);
                }
                Err(StoreError::Conflict) => {
                    warn!(event_id = %event.id, attempt, "swap lost race, re-reading");
                    last_failure = Some(StoreError::Conflict);
                }
                Err(StoreError::Inconsistent(detail)) => {
                    error!(event_id = %event.id, %detail, "entitlement store inconsistency");
                    return Ok(ReconcileOutcome::TargetNotFound);
                }
                Err(e) => {
                    warn!(event_id = %event.id, attempt, error = %e, "swap failed");
                    last_failure = Some(e);
                }
            }
        }

        let detail = match last_failure {
            Some(e) => e.to_string(),
            None => "retries exhausted".to_string(),
        };
        error!(event_id = %event.id, max_attempts = self.max_attempts, %detail, "reconciliation gave up");
        Err(WebhookError::Persistence(detail))
    }

    async fn find_target(
        &self,
        lookup: &Lookup,
    ) -> Result<Option<crate::domain::billing::Entitlement>, StoreError> {
        match lookup {
            Lookup::ByAccount(account_id) => self.store.find_by_account_id(*account_id).await,
            Lookup::ByCustomer(customer_id) => self.store.find_by_customer_id(customer_id).await,
        }
    }
}
