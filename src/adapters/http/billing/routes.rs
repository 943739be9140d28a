//! Route definitions for billing endpoints.

use axum::routing::post;
use axum::Router;

use crate::adapters::http::AppState;

use super::handlers;

/// Billing routes, mounted under the application router.
pub fn billing_routes() -> Router<AppState> {
    Router::new().route("/api/webhooks/stripe", post(handlers::handle_stripe_webhook))
}
