//! Entitlement record and status mapping.
//!
//! One entitlement record exists per local account. It is created when the
//! account is created, first linked to the payment provider on checkout
//! completion, and from then on mutated only by the reconciliation engine.
//! Records are never deleted; cancellation is a status transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::AccountId;

use super::event::ProviderEvent;

/// Local entitlement status, derived from provider status strings.
///
/// Richer than the single `is_entitled` bit: the product surfaces grace
/// periods and cancellations differently even though both deny access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementStatus {
    /// No subscription has ever been attached.
    None,
    /// Paid and current.
    Active,
    /// In a provider trial period.
    Trialing,
    /// Payment failed; provider is retrying.
    PastDue,
    /// Subscription ended or is otherwise defunct.
    Cancelled,
}

impl EntitlementStatus {
    /// Maps a provider status string to the local status.
    ///
    /// Anything unrecognized ("unpaid", "incomplete_expired", "paused",
    /// future additions) maps to `Cancelled`: fail closed so an unknown
    /// status can never grant access.
    pub fn from_provider(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "trialing" => Self::Trialing,
            "past_due" => Self::PastDue,
            _ => Self::Cancelled,
        }
    }

    /// Returns true if this status grants access to premium features.
    pub fn grants_access(&self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }

    /// Stable string form used by the persistence layer.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses the persistence-layer string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "active" => Some(Self::Active),
            "trialing" => Some(Self::Trialing),
            "past_due" => Some(Self::PastDue),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// The entitlement record for one local account.
#[derive(Debug, Clone, PartialEq)]
pub struct Entitlement {
    /// Primary key; immutable, assigned at account creation.
    pub account_id: AccountId,

    /// Provider customer identifier; set once on checkout completion and
    /// used as the secondary lookup key for subscription events.
    pub provider_customer_id: Option<String>,

    /// Provider subscription identifier.
    pub provider_subscription_id: Option<String>,

    /// The single bit gating premium features.
    pub is_entitled: bool,

    /// Richer status derived from provider status strings.
    pub status: EntitlementStatus,

    /// Identifier of the most recently applied event (idempotency key).
    pub last_event_id: Option<String>,

    /// Provider-assigned creation time of the most recently applied event
    /// (Unix seconds), used for the ordering check.
    pub last_event_at: Option<i64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entitlement {
    /// Creates the blank record written at account creation time.
    pub fn new(account_id: AccountId, now: DateTime<Utc>) -> Self {
        Self {
            account_id,
            provider_customer_id: None,
            provider_subscription_id: None,
            is_entitled: false,
            status: EntitlementStatus::None,
            last_event_id: None,
            last_event_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies checkout completion: links the provider identifiers and
    /// activates the entitlement.
    pub fn apply_checkout(&mut self, customer_id: &str, subscription_id: &str) {
        self.provider_customer_id = Some(customer_id.to_string());
        self.provider_subscription_id = Some(subscription_id.to_string());
        self.status = EntitlementStatus::Active;
        self.is_entitled = true;
    }

    /// Applies a subscription status change.
    ///
    /// Also refreshes the subscription id when the event carries one, so a
    /// record heals even if the checkout-completion event was missed.
    pub fn apply_subscription_update(
        &mut self,
        provider_status: &str,
        subscription_id: Option<&str>,
    ) {
        let status = EntitlementStatus::from_provider(provider_status);
        self.status = status;
        self.is_entitled = status.grants_access();
        if let Some(id) = subscription_id {
            self.provider_subscription_id = Some(id.to_string());
        }
    }

    /// Applies subscription deletion: access ends, history is kept.
    pub fn apply_subscription_deleted(&mut self) {
        self.status = EntitlementStatus::Cancelled;
        self.is_entitled = false;
    }

    /// Records the applied event's idempotency and ordering keys.
    ///
    /// Persisted in the same write as the mutation itself; the store's
    /// compare-and-swap keys on the previous `last_event_id`.
    pub fn record_event(&mut self, event: &ProviderEvent, now: DateTime<Utc>) {
        self.last_event_id = Some(event.id.clone());
        self.last_event_at = Some(event.created);
        self.updated_at = now;
    }

    /// Entitlement invariant: access implies an access-granting status.
    pub fn invariant_holds(&self) -> bool {
        !self.is_entitled || self.status.grants_access()
    }
}
