//! Payment Provider Integration
//!
//! The reconciler only ever talks to the provider through [`PaymentProvider`]:
//! it verifies the inbound event and then re-reads the objects the event
//! points at instead of trusting the embedded payload.

mod mock;
mod stripe_client;

pub use mock::MockProvider;
pub use stripe_client::StripeClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Event type string for a completed checkout
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// Event type string for a cancelled subscription
pub const SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";

/// What a verified event is about
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    CheckoutSessionCompleted { session_id: String },
    SubscriptionDeleted { subscription_id: String },
    Other { event_type: String },
}

impl EventKind {
    /// Classify a raw event type together with the id of its data object
    pub fn from_parts(event_type: &str, object_id: impl Into<String>) -> Self {
        match event_type {
            CHECKOUT_SESSION_COMPLETED => Self::CheckoutSessionCompleted {
                session_id: object_id.into(),
            },
            SUBSCRIPTION_DELETED => Self::SubscriptionDeleted {
                subscription_id: object_id.into(),
            },
            other => Self::Other {
                event_type: other.to_string(),
            },
        }
    }

    pub fn event_type(&self) -> &str {
        match self {
            Self::CheckoutSessionCompleted { .. } => CHECKOUT_SESSION_COMPLETED,
            Self::SubscriptionDeleted { .. } => SUBSCRIPTION_DELETED,
            Self::Other { event_type } => event_type,
        }
    }
}

/// An authenticated provider notification
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEvent {
    /// Provider event id (`evt_...`)
    pub id: String,

    pub kind: EventKind,
}

/// One purchased line of a checkout session
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub price_id: Option<String>,

    /// Whether the price bills on a schedule rather than once
    pub recurring: bool,
}

impl LineItem {
    pub fn recurring(price_id: impl Into<String>) -> Self {
        Self {
            price_id: Some(price_id.into()),
            recurring: true,
        }
    }

    pub fn one_time(price_id: impl Into<String>) -> Self {
        Self {
            price_id: Some(price_id.into()),
            recurring: false,
        }
    }
}

/// Authoritative checkout session, line items expanded
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSessionDetails {
    pub id: String,
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    pub line_items: Vec<LineItem>,
}

/// Authoritative subscription as far as reconciliation needs it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionDetails {
    pub id: String,
    pub customer_id: String,
}

/// Minimal webhook envelope: `{"id", "type", "data": {"object": {"id"}}}`
#[derive(Deserialize)]
struct Envelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: EnvelopeData,
}

#[derive(Deserialize)]
struct EnvelopeData {
    object: EnvelopeObject,
}

#[derive(Deserialize)]
struct EnvelopeObject {
    #[serde(default)]
    id: String,
}

/// Read the id, type and object id of an event without modelling the object
fn parse_envelope(payload: &[u8]) -> serde_json::Result<ProviderEvent> {
    let envelope: Envelope = serde_json::from_slice(payload)?;

    Ok(ProviderEvent {
        id: envelope.id,
        kind: EventKind::from_parts(&envelope.event_type, envelope.data.object.id),
    })
}

/// Payment provider client (Strategy pattern)
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Authenticate a raw webhook body against its signature header
    fn verify_event(&self, payload: &[u8], signature: &str, secret: &str) -> Result<ProviderEvent>;

    async fn fetch_checkout_session(&self, session_id: &str) -> Result<CheckoutSessionDetails>;

    async fn fetch_subscription(&self, subscription_id: &str) -> Result<SubscriptionDetails>;

    /// Provider name, for logs
    fn name(&self) -> &str;
}
