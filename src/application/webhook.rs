//! Webhook processing pipeline.
//!
//! Orchestrates the full delivery lifecycle: authenticate the raw bytes,
//! decode the event, apply environment guards, reconcile. The pipeline
//! owns no domain rules itself; it sequences the domain components.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::billing::{
    ProviderEvent, ReconcileOutcome, Reconciler, WebhookError, WebhookVerifier,
};

/// A raw webhook delivery as received from the transport.
#[derive(Debug, Clone)]
pub struct ProcessWebhookCommand {
    /// Exact raw body bytes; the signature covers these literally.
    pub payload: Vec<u8>,
    /// Contents of the `Stripe-Signature` header.
    pub signature: String,
}

/// Handles webhook deliveries end to end.
#[derive(Clone)]
pub struct ProcessWebhookHandler {
    verifier: Arc<WebhookVerifier>,
    reconciler: Reconciler,
    require_livemode: bool,
}

impl ProcessWebhookHandler {
    pub fn new(verifier: Arc<WebhookVerifier>, reconciler: Reconciler) -> Self {
        Self {
            verifier,
            reconciler,
            require_livemode: false,
        }
    }

    /// Rejects test-mode events. Off by default so local and staging
    /// environments can replay provider test fixtures.
    pub fn with_require_livemode(mut self, require_livemode: bool) -> Self {
        self.require_livemode = require_livemode;
        self
    }

    /// Processes one delivery and returns its outcome.
    ///
    /// Verification happens inline; the reconciliation itself runs on a
    /// spawned task so that a client disconnect mid-request cannot abandon
    /// a half-decided mutation.
    pub async fn handle(
        &self,
        command: ProcessWebhookCommand,
    ) -> Result<ReconcileOutcome, WebhookError> {
        self.verifier.verify(&command.payload, &command.signature)?;

        let event = ProviderEvent::decode(&command.payload)?;

        if self.require_livemode && !event.livemode {
            warn!(event_id = %event.id, "rejecting test mode event");
            return Err(WebhookError::LivemodeRequired);
        }

        info!(event_id = %event.id, kind = %event.kind, "webhook verified");

        let reconciler = self.reconciler.clone();
        let task = tokio::spawn(async move { reconciler.reconcile(&event).await });

        task.await
            .map_err(|e| WebhookError::Persistence(format!("reconciliation task failed: {e}")))?
    }
}
