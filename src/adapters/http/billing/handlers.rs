//! HTTP handlers for billing webhooks.
//!
//! The webhook handler is deliberately thin: extract the raw bytes and the
//! signature header, hand them to the application pipeline, and translate
//! the result into the acknowledgement status the provider's retry logic
//! keys on.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, warn};

use crate::adapters::http::AppState;
use crate::application::ProcessWebhookCommand;
use crate::domain::billing::WebhookError;

const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// POST /api/webhooks/stripe
///
/// The body must be the exact bytes the provider sent; any body-rewriting
/// middleware in front of this route breaks signature verification.
pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = match headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) {
        Some(value) => value.to_string(),
        None => {
            warn!("webhook delivery without signature header");
            return reject(&WebhookError::MissingField(SIGNATURE_HEADER));
        }
    };

    let command = ProcessWebhookCommand {
        payload: body.to_vec(),
        signature,
    };

    match state.webhook_handler.handle(command).await {
        Ok(_) => (StatusCode::OK, Json(json!({"received": true}))).into_response(),
        Err(e) => {
            if e.is_retryable() {
                error!(error = %e, "webhook processing failed, provider will redeliver");
            } else {
                warn!(error = %e, "webhook delivery rejected");
            }
            reject(&e)
        }
    }
}

fn reject(error: &WebhookError) -> Response {
    (
        error.status_code(),
        Json(json!({"error": error.to_string()})),
    )
        .into_response()
}
