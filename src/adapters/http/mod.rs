//! HTTP adapter: axum routes and handlers.

pub mod billing;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::application::ProcessWebhookHandler;

/// Shared state handed to every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    pub webhook_handler: ProcessWebhookHandler,
}

/// Builds the full application router.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(billing::routes::billing_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness probe for load balancers and uptime checks.
async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}
