//! # paywall-payments
//!
//! Subscription state for paywall, kept in step with Stripe through webhooks.
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌─────────────┐
//! │  Your Site  │────▶│  Stripe Hosted  │────▶│  Your Site  │
//! │  (pricing)  │     │  Payment Link   │     │  (success)  │
//! └─────────────┘     └────────┬────────┘     └─────────────┘
//!                              │ webhook
//!                              ▼
//!                    ┌───────────────────┐     ┌──────────────┐
//!                    │ WebhookReconciler │────▶│ AccountStore │
//!                    └───────────────────┘     └──────────────┘
//! ```
//!
//! The reconciler verifies the delivery, re-reads the referenced checkout
//! session or subscription from the provider, and updates the user's plan and
//! subscription row:
//!
//! | event                           | effect                                          |
//! |---------------------------------|-------------------------------------------------|
//! | `checkout.session.completed`    | link customer id once, upsert subscription, set `premium` |
//! | `customer.subscription.deleted` | set `free`, subscription row untouched          |
//! | anything else                   | acknowledged, no change                         |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use paywall_payments::{MemoryAccountStore, ReconcilerConfig, StripeClient, WebhookReconciler};
//!
//! let reconciler = WebhookReconciler::new(
//!     Arc::new(StripeClient::new("sk_test_xxx")),
//!     Arc::new(MemoryAccountStore::new()),
//!     ReconcilerConfig::from_env(),
//! );
//!
//! let reply = reconciler.reconcile(&raw_body, signature_header).await;
//! // reply.status: 200 or 400, reply.body: "Payment Received!" / "Webhook Error: ..."
//! ```

mod account;
mod config;
mod error;
pub mod provider;
pub mod signature;
mod webhook;

#[cfg(feature = "postgres")]
mod postgres;

pub use account::{
    AccountStore, BillingPeriod, MemoryAccountStore, Plan, Subscription, SubscriptionUpsert,
    User, UserUpdate,
};
pub use config::ReconcilerConfig;
pub use error::{PaymentError, Result};
#[cfg(feature = "postgres")]
pub use postgres::{MIGRATOR, PgAccountStore};
pub use provider::{
    CheckoutSessionDetails, EventKind, LineItem, MockProvider, PaymentProvider, ProviderEvent,
    StripeClient, SubscriptionDetails,
};
pub use webhook::{ACKNOWLEDGEMENT, ReconcileOutcome, WebhookReconciler, WebhookReply};
