//! Payment provider configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::billing::DEFAULT_TOLERANCE_SECS;

/// Payment configuration (Stripe webhooks)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Webhook signing secret from the provider dashboard
    pub stripe_webhook_secret: SecretString,

    /// Maximum accepted age for signed timestamps, in seconds
    #[serde(default = "default_tolerance")]
    pub webhook_tolerance_secs: i64,

    /// Reject test-mode events (enable in production)
    #[serde(default)]
    pub require_livemode: bool,
}

impl PaymentConfig {
    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let secret = self.stripe_webhook_secret.expose_secret();
        if secret.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_WEBHOOK_SECRET"));
        }
        // Verify secret prefix for safety
        if !secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidWebhookSecret);
        }
        if self.webhook_tolerance_secs <= 0 {
            return Err(ValidationError::InvalidWebhookTolerance);
        }
        Ok(())
    }
}

fn default_tolerance() -> i64 {
    DEFAULT_TOLERANCE_SECS
}
