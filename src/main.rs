//! Service entry point.
//!
//! Wires configuration, the Postgres entitlement store, and the webhook
//! pipeline into an axum server.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use branchwise_billing::adapters::http::{app_router, AppState};
use branchwise_billing::adapters::postgres::PostgresEntitlementStore;
use branchwise_billing::application::ProcessWebhookHandler;
use branchwise_billing::config::AppConfig;
use branchwise_billing::domain::billing::{Reconciler, WebhookVerifier};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await?;

    if config.database.run_migrations {
        info!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
    }

    let store = Arc::new(PostgresEntitlementStore::new(pool));
    let verifier = Arc::new(
        WebhookVerifier::new(config.payment.stripe_webhook_secret.clone())
            .with_tolerance_secs(config.payment.webhook_tolerance_secs),
    );
    let reconciler = Reconciler::new(store);
    let webhook_handler = ProcessWebhookHandler::new(verifier, reconciler)
        .with_require_livemode(config.payment.require_livemode);

    let router = app_router(AppState { webhook_handler });

    let addr = config.server.socket_addr()?;
    info!(%addr, "starting webhook server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install shutdown handler");
    }
}
