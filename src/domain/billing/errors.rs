//! Webhook error taxonomy.
//!
//! Every failure mode of the webhook pipeline, with the HTTP status
//! mapping the provider's retry logic expects: client errors will not
//! succeed on redelivery, server errors signal "please redeliver".

use axum::http::StatusCode;
use thiserror::Error;

/// Errors that occur while authenticating, decoding, or reconciling a
/// webhook delivery.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Recomputed HMAC matched none of the signatures in the header.
    #[error("signature mismatch")]
    SignatureMismatch,

    /// Signed timestamp is older than the configured tolerance; rejected
    /// to prevent replay of captured payloads.
    #[error("signed timestamp outside tolerance")]
    StaleTimestamp,

    /// Signed timestamp is in the future beyond clock-skew allowance.
    #[error("signed timestamp in the future")]
    FutureTimestamp,

    /// Signature header or JSON payload is structurally invalid.
    #[error("malformed payload: {0}")]
    ParseError(String),

    /// A field the event kind requires is absent from the payload.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// Test-mode event received while live mode is required.
    #[error("test mode event rejected")]
    LivemodeRequired,

    /// The entitlement store could not complete the write after bounded
    /// retries. The delivery must be retried by the provider.
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl WebhookError {
    /// Returns true if the provider should redeliver this event.
    ///
    /// Only persistence failures can succeed on a later attempt; every
    /// other variant is a property of the payload or secret and will fail
    /// identically on redelivery.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::Persistence(_))
    }

    /// Maps the error to the HTTP status the acknowledger returns.
    ///
    /// - 4xx: reject, no retry expected to help
    /// - 5xx: provider will redeliver
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::SignatureMismatch
            | WebhookError::StaleTimestamp
            | WebhookError::FutureTimestamp
            | WebhookError::ParseError(_)
            | WebhookError::MissingField(_)
            | WebhookError::LivemodeRequired => StatusCode::BAD_REQUEST,

            WebhookError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_mismatch_is_client_error() {
        let err = WebhookError::SignatureMismatch;
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_retryable());
    }

    #[test]
    fn stale_timestamp_is_client_error() {
        assert_eq!(
            WebhookError::StaleTimestamp.status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn parse_error_is_client_error() {
        let err = WebhookError::ParseError("bad json".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_retryable());
    }

    #[test]
    fn missing_field_is_client_error() {
        let err = WebhookError::MissingField("customer");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "missing field: customer");
    }

    #[test]
    fn persistence_failure_requests_redelivery() {
        let err = WebhookError::Persistence("pool exhausted".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_retryable());
    }

    #[test]
    fn livemode_rejection_is_client_error() {
        assert_eq!(
            WebhookError::LivemodeRequired.status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
