//! paywall HTTP Server
//!
//! Axum-based server receiving Stripe webhooks and keeping user plans and
//! subscriptions in step with them.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paywall_payments::{
    AccountStore, MemoryAccountStore, PgAccountStore, ReconcilerConfig, StripeClient,
    WebhookReconciler,
};

use crate::handlers::{health_check, stripe_webhook};
use crate::state::AppState;

/// Routes served by the binary
pub fn router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/webhook/stripe", post(stripe_webhook))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

async fn account_store() -> anyhow::Result<(Arc<dyn AccountStore>, &'static str)> {
    match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let store = PgAccountStore::connect(&url).await?;
            tracing::info!("✓ Connected to Postgres");
            Ok((Arc::new(store), "postgres"))
        }
        Err(_) => {
            tracing::warn!("⚠ DATABASE_URL not set - using in-memory account store");
            Ok((Arc::new(MemoryAccountStore::new()), "memory"))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Provider calls fail at first use when the key is absent.
    let stripe = StripeClient::from_env().unwrap_or_else(|e| {
        tracing::warn!("⚠ {} - Stripe lookups will fail", e);
        StripeClient::new("")
    });

    let (store, store_kind) = account_store().await?;
    let config = ReconcilerConfig::from_env();

    let state = AppState {
        reconciler: Arc::new(WebhookReconciler::new(Arc::new(stripe), store, config)),
        store_kind,
    };

    let app = router(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🚀 paywall server running on http://{}", addr);
    tracing::info!("  GET  /health              - Health check");
    tracing::info!("  POST /api/webhook/stripe  - Stripe webhook");

    axum::serve(listener, app).await?;

    Ok(())
}
