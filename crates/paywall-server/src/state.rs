//! Application State

use std::sync::Arc;

use paywall_payments::WebhookReconciler;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Applies verified Stripe events to the account store
    pub reconciler: Arc<WebhookReconciler>,

    /// Which account store backs the reconciler, for the health report
    pub store_kind: &'static str,
}
