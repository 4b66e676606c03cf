//! Mock Provider
//!
//! For tests and local development. Verifies Stripe-format signatures and
//! serves checkout sessions and subscriptions from in-memory fixtures.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{
    CheckoutSessionDetails, PaymentProvider, ProviderEvent, SubscriptionDetails, parse_envelope,
};
use crate::error::{PaymentError, Result};
use crate::signature;

/// In-memory provider with static fixtures
pub struct MockProvider {
    sessions: RwLock<HashMap<String, CheckoutSessionDetails>>,
    subscriptions: RwLock<HashMap<String, SubscriptionDetails>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            subscriptions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a checkout session the provider will return by id
    pub fn insert_checkout_session(&self, session: CheckoutSessionDetails) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        sessions.insert(session.id.clone(), session);
        Ok(())
    }

    /// Register a subscription the provider will return by id
    pub fn insert_subscription(&self, subscription: SubscriptionDetails) -> Result<()> {
        let mut subscriptions = self.subscriptions.write().map_err(poisoned)?;
        subscriptions.insert(subscription.id.clone(), subscription);
        Ok(())
    }

    /// Build a webhook body for `event_type` pointing at `object_id`
    pub fn event_payload(event_id: &str, event_type: &str, object_id: &str) -> Vec<u8> {
        serde_json::json!({
            "id": event_id,
            "object": "event",
            "type": event_type,
            "data": { "object": { "id": object_id } },
        })
        .to_string()
        .into_bytes()
    }

    /// Sign a body the way the provider would, timestamped now
    pub fn sign(payload: &[u8], secret: &str) -> Result<String> {
        signature::sign(payload, secret, Utc::now().timestamp())
    }
}

fn poisoned<T>(_: T) -> PaymentError {
    PaymentError::Provider("mock provider lock poisoned".into())
}

#[async_trait]
impl PaymentProvider for MockProvider {
    fn verify_event(&self, payload: &[u8], signature: &str, secret: &str) -> Result<ProviderEvent> {
        signature::verify(
            payload,
            signature,
            secret,
            Utc::now().timestamp(),
            signature::DEFAULT_TOLERANCE_SECS,
        )?;

        parse_envelope(payload)
            .map_err(|e| PaymentError::SignatureInvalid(format!("unparseable event: {e}")))
    }

    async fn fetch_checkout_session(&self, session_id: &str) -> Result<CheckoutSessionDetails> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| PaymentError::Provider(format!("No such checkout.session: '{session_id}'")))
    }

    async fn fetch_subscription(&self, subscription_id: &str) -> Result<SubscriptionDetails> {
        let subscriptions = self.subscriptions.read().map_err(poisoned)?;
        subscriptions
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| PaymentError::Provider(format!("No such subscription: '{subscription_id}'")))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{EventKind, LineItem};

    const SECRET: &str = "whsec_mock";

    #[test]
    fn test_verify_signed_event() {
        let provider = MockProvider::new();
        let payload = MockProvider::event_payload("evt_1", "checkout.session.completed", "cs_1");
        let header = MockProvider::sign(&payload, SECRET).unwrap();

        let event = provider.verify_event(&payload, &header, SECRET).unwrap();
        assert_eq!(event.id, "evt_1");
        assert_eq!(
            event.kind,
            EventKind::CheckoutSessionCompleted { session_id: "cs_1".into() }
        );
    }

    #[test]
    fn test_signed_garbage_is_rejected() {
        let provider = MockProvider::new();
        let header = MockProvider::sign(b"not json", SECRET).unwrap();
        let result = provider.verify_event(b"not json", &header, SECRET);
        assert!(matches!(result, Err(PaymentError::SignatureInvalid(_))));
    }

    #[tokio::test]
    async fn test_fixtures_are_served() {
        let provider = MockProvider::new();
        provider
            .insert_checkout_session(CheckoutSessionDetails {
                id: "cs_1".into(),
                customer_id: Some("cus_1".into()),
                customer_email: Some("ada@example.com".into()),
                line_items: vec![LineItem::recurring("price_month")],
            })
            .unwrap();

        let session = provider.fetch_checkout_session("cs_1").await.unwrap();
        assert_eq!(session.customer_id.as_deref(), Some("cus_1"));
        assert!(provider.fetch_subscription("sub_missing").await.is_err());
    }
}
