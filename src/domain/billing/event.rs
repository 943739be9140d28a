//! Provider webhook event types.
//!
//! Defines the structures for parsing payment-provider webhook payloads.
//! Only fields relevant to entitlement reconciliation are captured; the
//! event-specific `data.object` stays opaque JSON until a handler selects
//! a typed view of it.

use serde::{Deserialize, Serialize};

use super::errors::WebhookError;

/// A decoded webhook event from the payment provider.
///
/// Contains the essential fields needed for reconciliation. Additional
/// fields from the provider's full event schema are ignored.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderEvent {
    /// Unique identifier for the event (evt_xxx format); the idempotency key.
    pub id: String,

    /// Kind of event (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub kind: String,

    /// Provider-assigned creation time (Unix timestamp); the ordering key.
    pub created: i64,

    /// Container for event-specific data.
    pub data: EventData,

    /// Whether this is a live mode event (vs test mode).
    #[serde(default)]
    pub livemode: bool,
}

/// Container for event-specific data.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventData {
    /// The object that triggered the event (polymorphic based on kind).
    pub object: serde_json::Value,

    /// Previous values for updated attributes (only for update events).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_attributes: Option<serde_json::Value>,
}

impl ProviderEvent {
    /// Decodes a raw webhook body into an event.
    ///
    /// Unknown event kinds decode successfully; only structurally invalid
    /// JSON is rejected.
    pub fn decode(raw: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(raw).map_err(|e| WebhookError::ParseError(e.to_string()))
    }

    /// Parses the kind string into a known enum variant.
    pub fn parsed_kind(&self) -> EventKind {
        EventKind::from_kind(&self.kind)
    }

    /// Attempts to deserialize the data object as the specified type.
    pub fn deserialize_object<T: serde::de::DeserializeOwned>(
        &self,
    ) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.object.clone())
    }
}

/// Known event kinds that drive entitlement mutations.
///
/// Matching on this enum is exhaustive everywhere: a newly-introduced kind
/// lands in `Other` and takes the no-op path rather than being misrouted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Checkout completed; links an account to a provider customer.
    CheckoutSessionCompleted,
    /// Subscription status changed.
    SubscriptionUpdated,
    /// Subscription ended.
    SubscriptionDeleted,
    /// Any kind this service does not act on.
    Other,
}

impl EventKind {
    /// Parses an event kind from the provider's kind string.
    pub fn from_kind(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "customer.subscription.updated" => Self::SubscriptionUpdated,
            "customer.subscription.deleted" => Self::SubscriptionDeleted,
            _ => Self::Other,
        }
    }
}

/// Typed view of a checkout session object.
///
/// Fields are optional at the serde level so that required-field checks can
/// produce a precise `MissingField` error instead of a generic parse error.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionObject {
    /// Opaque local account reference, carried through checkout initiation.
    pub client_reference_id: Option<String>,

    /// Provider customer identifier.
    pub customer: Option<String>,

    /// Provider subscription identifier.
    pub subscription: Option<String>,
}

/// Typed view of a subscription object (update and deletion events).
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionObject {
    /// Provider subscription identifier.
    pub id: Option<String>,

    /// Provider customer identifier.
    pub customer: Option<String>,

    /// Provider status string ("active", "past_due", ...).
    pub status: Option<String>,

    /// Whether the subscription is scheduled to end at the period boundary.
    #[serde(default)]
    pub cancel_at_period_end: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_minimal_event() {
        let raw = br#"{
            "id": "evt_1234567890",
            "type": "checkout.session.completed",
            "created": 1704067200,
            "data": { "object": {} }
        }"#;

        let event = ProviderEvent::decode(raw).unwrap();

        assert_eq!(event.id, "evt_1234567890");
        assert_eq!(event.kind, "checkout.session.completed");
        assert_eq!(event.created, 1704067200);
        assert!(!event.livemode);
    }

    #[test]
    fn decode_rejects_invalid_json() {
        let result = ProviderEvent::decode(b"not valid json");
        assert!(matches!(result, Err(WebhookError::ParseError(_))));
    }

    #[test]
    fn decode_rejects_missing_id() {
        let raw = br#"{"type": "x", "created": 1, "data": {"object": {}}}"#;
        assert!(matches!(
            ProviderEvent::decode(raw),
            Err(WebhookError::ParseError(_))
        ));
    }

    #[test]
    fn decode_accepts_unknown_kind() {
        let raw = br#"{
            "id": "evt_unknown",
            "type": "invoice.finalized",
            "created": 1704067200,
            "data": { "object": {"foo": "bar"} }
        }"#;

        let event = ProviderEvent::decode(raw).unwrap();
        assert_eq!(event.parsed_kind(), EventKind::Other);
    }

    #[test]
    fn decode_keeps_previous_attributes() {
        let raw = br#"{
            "id": "evt_update",
            "type": "customer.subscription.updated",
            "created": 1704067200,
            "data": {
                "object": {"status": "active"},
                "previous_attributes": {"status": "past_due"}
            },
            "livemode": true
        }"#;

        let event = ProviderEvent::decode(raw).unwrap();
        assert!(event.livemode);
        let prev = event.data.previous_attributes.unwrap();
        assert_eq!(prev["status"], "past_due");
    }

    #[test]
    fn kind_parsing_covers_handled_events() {
        assert_eq!(
            EventKind::from_kind("checkout.session.completed"),
            EventKind::CheckoutSessionCompleted
        );
        assert_eq!(
            EventKind::from_kind("customer.subscription.updated"),
            EventKind::SubscriptionUpdated
        );
        assert_eq!(
            EventKind::from_kind("customer.subscription.deleted"),
            EventKind::SubscriptionDeleted
        );
        assert_eq!(EventKind::from_kind("charge.refunded"), EventKind::Other);
    }

    #[test]
    fn deserialize_object_as_checkout_session() {
        let raw = serde_json::to_vec(&json!({
            "id": "evt_cs",
            "type": "checkout.session.completed",
            "created": 1704067200,
            "data": { "object": {
                "id": "cs_test",
                "client_reference_id": "6a3c1a66-30d8-4f3f-b6f3-9a3c70e6dd3f",
                "customer": "cus_123",
                "subscription": "sub_456"
            }}
        }))
        .unwrap();

        let event = ProviderEvent::decode(&raw).unwrap();
        let session: CheckoutSessionObject = event.deserialize_object().unwrap();

        assert_eq!(session.customer.as_deref(), Some("cus_123"));
        assert_eq!(session.subscription.as_deref(), Some("sub_456"));
    }

    #[test]
    fn subscription_object_defaults_cancel_flag() {
        let object: SubscriptionObject = serde_json::from_value(json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": "active"
        }))
        .unwrap();

        assert!(!object.cancel_at_period_end);
    }
}
