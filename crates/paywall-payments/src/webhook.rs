//! Stripe Webhook Reconciliation
//!
//! Turns verified provider events into account and subscription changes.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::account::{AccountStore, BillingPeriod, Plan, SubscriptionUpsert, UserUpdate};
use crate::config::ReconcilerConfig;
use crate::error::{PaymentError, Result};
use crate::provider::{EventKind, PaymentProvider, ProviderEvent};

/// Body returned for every accepted event, handled or not
pub const ACKNOWLEDGEMENT: &str = "Payment Received!";

/// HTTP-shaped answer for the provider
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookReply {
    pub status: u16,
    pub body: String,
}

impl WebhookReply {
    pub fn received() -> Self {
        Self {
            status: 200,
            body: ACKNOWLEDGEMENT.to_string(),
        }
    }

    pub fn rejected(error: &PaymentError) -> Self {
        Self {
            status: 400,
            body: format!("Webhook Error: {error}"),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.status == 200
    }
}

#[cfg(feature = "axum-handlers")]
impl axum::response::IntoResponse for WebhookReply {
    fn into_response(self) -> axum::response::Response {
        let status = axum::http::StatusCode::from_u16(self.status)
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        (status, self.body).into_response()
    }
}

/// What handling an event changed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconcileOutcome {
    /// Checkout completed for a known user; one period per recurring line item
    SubscriptionActivated {
        user_id: Uuid,
        periods: Vec<BillingPeriod>,
    },

    /// Checkout session carried no customer email, nothing to attach it to
    MissingCustomerEmail { session_id: String },

    /// Subscription cancelled, user moved back to the free plan
    PlanDowngraded { user_id: Uuid },

    /// Event type we do not act on
    Ignored { event_type: String },
}

/// Webhook reconciler
pub struct WebhookReconciler {
    provider: Arc<dyn PaymentProvider>,
    store: Arc<dyn AccountStore>,
    config: ReconcilerConfig,
}

impl WebhookReconciler {
    pub fn new(
        provider: Arc<dyn PaymentProvider>,
        store: Arc<dyn AccountStore>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            provider,
            store,
            config,
        }
    }

    pub const fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    fn verify(&self, payload: &[u8], signature: &str) -> Result<ProviderEvent> {
        let secret = &self.config.webhook_secret;
        if secret.is_empty() {
            return Err(PaymentError::SignatureInvalid(
                "no webhook signing secret configured".into(),
            ));
        }

        self.provider.verify_event(payload, signature, secret)
    }

    /// Authenticate, apply, and answer a raw webhook delivery
    ///
    /// Never fails: every error becomes a 400 reply. Writes made before a
    /// failure are kept.
    pub async fn reconcile(&self, payload: &[u8], signature: &str) -> WebhookReply {
        let event = match self.verify(payload, signature) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(provider = self.provider.name(), error = %e, "Webhook rejected");
                return WebhookReply::rejected(&e);
            }
        };

        match self.handle(&event).await {
            Ok(outcome) => {
                tracing::info!(event_id = %event.id, outcome = ?outcome, "Webhook processed");
                WebhookReply::received()
            }
            Err(e) => {
                tracing::error!(
                    event_id = %event.id,
                    event_type = event.kind.event_type(),
                    transient = e.is_transient(),
                    error = %e,
                    "Error processing webhook event"
                );
                WebhookReply::rejected(&e)
            }
        }
    }

    /// Apply an already verified event
    pub async fn handle(&self, event: &ProviderEvent) -> Result<ReconcileOutcome> {
        tracing::info!(
            event_id = %event.id,
            event_type = event.kind.event_type(),
            provider = self.provider.name(),
            "Processing webhook event"
        );

        match &event.kind {
            EventKind::CheckoutSessionCompleted { session_id } => {
                self.checkout_completed(session_id).await
            }
            EventKind::SubscriptionDeleted { subscription_id } => {
                self.subscription_deleted(subscription_id).await
            }
            EventKind::Other { event_type } => {
                tracing::debug!(event_type = %event_type, "Unhandled webhook event");
                Ok(ReconcileOutcome::Ignored {
                    event_type: event_type.clone(),
                })
            }
        }
    }

    async fn checkout_completed(&self, session_id: &str) -> Result<ReconcileOutcome> {
        // The event body only points at the session; read the real one back.
        let session = self.provider.fetch_checkout_session(session_id).await?;

        let Some(email) = session.customer_email.as_deref() else {
            tracing::debug!(session_id = %session_id, "Checkout session has no customer email");
            return Ok(ReconcileOutcome::MissingCustomerEmail {
                session_id: session_id.to_string(),
            });
        };

        let user = self
            .store
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| PaymentError::UserNotFound(format!("email {email}")))?;

        if user.customer_id.is_none() {
            if let Some(customer_id) = session.customer_id.as_deref() {
                self.store
                    .update_user(user.id, UserUpdate::customer_id(customer_id))
                    .await?;
                tracing::info!(user_id = %user.id, customer_id = %customer_id, "Linked Stripe customer");
            }
        }

        let mut periods = Vec::new();
        for item in session.line_items.iter().filter(|item| item.recurring) {
            let price_id = item.price_id.as_deref().unwrap_or_default();
            let period = self
                .config
                .period_for_price(price_id)
                .ok_or_else(|| PaymentError::InvalidPriceId(price_id.to_string()))?;

            let subscription = self
                .store
                .upsert_subscription(SubscriptionUpsert::premium(user.id, period, Utc::now()))
                .await?;

            tracing::info!(
                user_id = %user.id,
                period = %period,
                end_date = %subscription.end_date,
                "Subscription written"
            );
            periods.push(period);
        }

        // Premium even when no recurring item was present.
        self.store
            .update_user(user.id, UserUpdate::plan(Plan::Premium))
            .await?;

        Ok(ReconcileOutcome::SubscriptionActivated {
            user_id: user.id,
            periods,
        })
    }

    async fn subscription_deleted(&self, subscription_id: &str) -> Result<ReconcileOutcome> {
        let subscription = self.provider.fetch_subscription(subscription_id).await?;

        let user = self
            .store
            .find_user_by_customer_id(&subscription.customer_id)
            .await?
            .ok_or_else(|| {
                PaymentError::UserNotFound(format!("customer {}", subscription.customer_id))
            })?;

        // The subscription row is left as it was.
        self.store
            .update_user(user.id, UserUpdate::plan(Plan::Free))
            .await?;

        tracing::info!(
            user_id = %user.id,
            subscription_id = %subscription_id,
            "Downgraded user to free plan"
        );

        Ok(ReconcileOutcome::PlanDowngraded { user_id: user.id })
    }
}
