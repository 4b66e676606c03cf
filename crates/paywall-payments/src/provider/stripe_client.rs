//! Stripe Provider
//!
//! [`PaymentProvider`] backed by the Stripe API through `async-stripe`.

use async_trait::async_trait;
use stripe::{
    CheckoutSession, CheckoutSessionId, CheckoutSessionItem, Client, Event, EventObject,
    EventType, Subscription, SubscriptionId, Webhook, WebhookError,
};

use super::{
    CheckoutSessionDetails, EventKind, LineItem, PaymentProvider, ProviderEvent,
    SubscriptionDetails, parse_envelope,
};
use crate::error::{PaymentError, Result};

/// Stripe client wrapper
pub struct StripeClient {
    client: Client,
}

impl StripeClient {
    /// Create a new Stripe client
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
        }
    }

    /// Create from `STRIPE_SECRET_KEY`
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| PaymentError::Config("STRIPE_SECRET_KEY not set".into()))?;

        Ok(Self::new(&secret_key))
    }

    /// Get the underlying Stripe client
    pub const fn inner(&self) -> &Client {
        &self.client
    }
}

/// Narrow a Stripe event to the kinds reconciliation cares about
fn to_provider_event(event: &Event) -> Result<ProviderEvent> {
    let kind = match event.type_ {
        EventType::CheckoutSessionCompleted => {
            if let EventObject::CheckoutSession(session) = &event.data.object {
                EventKind::CheckoutSessionCompleted {
                    session_id: session.id.to_string(),
                }
            } else {
                return Err(PaymentError::WebhookParse("Invalid checkout session data".into()));
            }
        }

        EventType::CustomerSubscriptionDeleted => {
            if let EventObject::Subscription(sub) = &event.data.object {
                EventKind::SubscriptionDeleted {
                    subscription_id: sub.id.to_string(),
                }
            } else {
                return Err(PaymentError::WebhookParse("Invalid subscription data".into()));
            }
        }

        _ => EventKind::Other {
            event_type: event.type_.to_string(),
        },
    };

    Ok(ProviderEvent {
        id: event.id.to_string(),
        kind,
    })
}

fn to_line_item(item: &CheckoutSessionItem) -> LineItem {
    LineItem {
        price_id: item.price.as_ref().map(|price| price.id.to_string()),
        recurring: item
            .price
            .as_ref()
            .is_some_and(|price| price.recurring.is_some()),
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    fn verify_event(&self, payload: &[u8], signature: &str, secret: &str) -> Result<ProviderEvent> {
        // async-stripe accepts a zero-length HMAC key.
        if secret.is_empty() {
            return Err(PaymentError::SignatureInvalid("no signing secret configured".into()));
        }

        let body = std::str::from_utf8(payload)
            .map_err(|e| PaymentError::SignatureInvalid(format!("payload is not UTF-8: {e}")))?;

        match Webhook::construct_event(body, signature, secret) {
            Ok(event) => to_provider_event(&event),
            // Signature and timestamp already checked; only the object is unmodelled.
            Err(WebhookError::BadParse(model_err)) => {
                tracing::debug!(error = %model_err, "Event object not modelled, reading envelope only");
                parse_envelope(payload)
                    .map_err(|e| PaymentError::WebhookParse(format!("unparseable event: {e}")))
            }
            Err(e) => Err(PaymentError::SignatureInvalid(e.to_string())),
        }
    }

    async fn fetch_checkout_session(&self, session_id: &str) -> Result<CheckoutSessionDetails> {
        let id = session_id.parse::<CheckoutSessionId>().map_err(|e| {
            PaymentError::WebhookParse(format!("bad checkout session id {session_id}: {e}"))
        })?;

        let session = CheckoutSession::retrieve(&self.client, &id, &["line_items"])
            .await
            .map_err(|e| PaymentError::Provider(e.to_string()))?;

        // Expansion returns the first page of line items only.
        let line_items = session
            .line_items
            .as_ref()
            .map(|list| list.data.iter().map(to_line_item).collect())
            .unwrap_or_default();

        Ok(CheckoutSessionDetails {
            id: session.id.to_string(),
            customer_id: session.customer.as_ref().map(|c| c.id().to_string()),
            customer_email: session
                .customer_details
                .as_ref()
                .and_then(|details| details.email.clone()),
            line_items,
        })
    }

    async fn fetch_subscription(&self, subscription_id: &str) -> Result<SubscriptionDetails> {
        let id = subscription_id.parse::<SubscriptionId>().map_err(|e| {
            PaymentError::WebhookParse(format!("bad subscription id {subscription_id}: {e}"))
        })?;

        let subscription = Subscription::retrieve(&self.client, &id, &[])
            .await
            .map_err(|e| PaymentError::Provider(e.to_string()))?;

        Ok(SubscriptionDetails {
            id: subscription.id.to_string(),
            customer_id: subscription.customer.id().to_string(),
        })
    }

    fn name(&self) -> &str {
        "stripe"
    }
}
