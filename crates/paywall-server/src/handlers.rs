//! HTTP Handlers

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use serde::Serialize;

use paywall_payments::WebhookReply;

use crate::state::AppState;

/// Header carrying Stripe's `t=...,v1=...` signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub store: &'static str,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        store: state.store_kind,
    })
}

/// Stripe webhook handler
///
/// Takes the body as raw bytes; the signature covers them exactly as sent.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookReply {
    // A missing header is treated as an empty signature and fails verification.
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    state.reconciler.reconcile(&body, signature).await
}
