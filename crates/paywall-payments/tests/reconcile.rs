//! End-to-end reconciliation against the mock provider and memory store

use std::sync::Arc;
use std::time::Duration;

use chrono::{Months, Utc};
use paywall_payments::{
    AccountStore, BillingPeriod, CheckoutSessionDetails, LineItem, MemoryAccountStore,
    MockProvider, Plan, ReconcilerConfig, SubscriptionDetails, User, WebhookReconciler,
    WebhookReply,
};

const SECRET: &str = "whsec_test_secret";
const MONTHLY: &str = "price_monthly";
const YEARLY: &str = "price_yearly";

struct Harness {
    provider: Arc<MockProvider>,
    store: Arc<MemoryAccountStore>,
    reconciler: WebhookReconciler,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(ReconcilerConfig::new(SECRET, MONTHLY, YEARLY))
    }

    fn with_config(config: ReconcilerConfig) -> Self {
        let provider = Arc::new(MockProvider::new());
        let store = Arc::new(MemoryAccountStore::new());
        let reconciler = WebhookReconciler::new(provider.clone(), store.clone(), config);
        Self {
            provider,
            store,
            reconciler,
        }
    }

    async fn user(&self, email: &str) -> User {
        self.store.create_user(email).await.unwrap()
    }

    async fn reload(&self, user: &User) -> User {
        self.store
            .find_user_by_email(&user.email)
            .await
            .unwrap()
            .unwrap()
    }

    fn checkout(&self, id: &str, email: Option<&str>, customer: &str, items: Vec<LineItem>) {
        self.provider
            .insert_checkout_session(CheckoutSessionDetails {
                id: id.into(),
                customer_id: Some(customer.into()),
                customer_email: email.map(str::to_string),
                line_items: items,
            })
            .unwrap();
    }

    async fn deliver(&self, event_id: &str, event_type: &str, object_id: &str) -> WebhookReply {
        let payload = MockProvider::event_payload(event_id, event_type, object_id);
        let header = MockProvider::sign(&payload, SECRET).unwrap();
        self.reconciler.reconcile(&payload, &header).await
    }
}

#[tokio::test]
async fn monthly_checkout_activates_premium() {
    let h = Harness::new();
    let user = h.user("ada@example.com").await;
    h.checkout("cs_1", Some("ada@example.com"), "cus_1", vec![LineItem::recurring(MONTHLY)]);

    let before = Utc::now();
    let reply = h.deliver("evt_1", "checkout.session.completed", "cs_1").await;
    let after = Utc::now();

    assert_eq!(reply, WebhookReply::received());

    let user = h.reload(&user).await;
    assert_eq!(user.plan, Plan::Premium);
    assert_eq!(user.customer_id.as_deref(), Some("cus_1"));

    let sub = h.store.find_subscription(user.id).await.unwrap().unwrap();
    assert_eq!(sub.period, BillingPeriod::Monthly);
    assert_eq!(sub.plan, Plan::Premium);
    assert!(sub.start_date >= before && sub.start_date <= after);
    assert!(sub.end_date >= before.checked_add_months(Months::new(1)).unwrap());
    assert!(sub.end_date <= after.checked_add_months(Months::new(1)).unwrap());
}

#[tokio::test]
async fn yearly_checkout_runs_a_year() {
    let h = Harness::new();
    let user = h.user("ada@example.com").await;
    h.checkout("cs_1", Some("ada@example.com"), "cus_1", vec![LineItem::recurring(YEARLY)]);

    let before = Utc::now();
    let reply = h.deliver("evt_1", "checkout.session.completed", "cs_1").await;
    let after = Utc::now();

    assert!(reply.is_success());

    let sub = h.store.find_subscription(user.id).await.unwrap().unwrap();
    assert_eq!(sub.period, BillingPeriod::Yearly);
    assert!(sub.end_date >= before.checked_add_months(Months::new(12)).unwrap());
    assert!(sub.end_date <= after.checked_add_months(Months::new(12)).unwrap());
}

#[tokio::test]
async fn replay_keeps_customer_id_but_rewrites_dates() {
    let h = Harness::new();
    let user = h.user("ada@example.com").await;
    h.checkout("cs_1", Some("ada@example.com"), "cus_1", vec![LineItem::recurring(MONTHLY)]);

    assert!(h.deliver("evt_1", "checkout.session.completed", "cs_1").await.is_success());
    let first = h.store.find_subscription(user.id).await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;

    assert!(h.deliver("evt_1", "checkout.session.completed", "cs_1").await.is_success());
    let second = h.store.find_subscription(user.id).await.unwrap().unwrap();

    assert_eq!(first.id, second.id);
    assert!(second.start_date > first.start_date);
    assert!(second.end_date > first.end_date);
    assert_eq!(h.store.subscriptions().unwrap().len(), 1);

    // A later purchase under another customer never replaces the first link.
    h.checkout("cs_2", Some("ada@example.com"), "cus_2", vec![LineItem::recurring(YEARLY)]);
    assert!(h.deliver("evt_2", "checkout.session.completed", "cs_2").await.is_success());

    let user = h.reload(&user).await;
    assert_eq!(user.customer_id.as_deref(), Some("cus_1"));
    let third = h.store.find_subscription(user.id).await.unwrap().unwrap();
    assert_eq!(third.period, BillingPeriod::Yearly);
}

#[tokio::test]
async fn bad_signature_is_rejected_without_writes() {
    let h = Harness::new();
    let user = h.user("ada@example.com").await;
    h.checkout("cs_1", Some("ada@example.com"), "cus_1", vec![LineItem::recurring(MONTHLY)]);

    let payload = MockProvider::event_payload("evt_1", "checkout.session.completed", "cs_1");
    let header = MockProvider::sign(&payload, "whsec_someone_else").unwrap();
    let reply = h.reconciler.reconcile(&payload, &header).await;

    assert_eq!(reply.status, 400);
    assert!(reply.body.starts_with("Webhook Error: "));

    let reply = h.reconciler.reconcile(&payload, "").await;
    assert_eq!(reply.status, 400);

    assert_eq!(h.reload(&user).await, user);
    assert!(h.store.subscriptions().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_email_fails_without_writes() {
    let h = Harness::new();
    let user = h.user("ada@example.com").await;
    h.checkout("cs_1", Some("grace@example.com"), "cus_1", vec![LineItem::recurring(MONTHLY)]);

    let reply = h.deliver("evt_1", "checkout.session.completed", "cs_1").await;

    assert_eq!(reply.status, 400);
    assert_eq!(reply.body, "Webhook Error: User not found for email grace@example.com");
    assert_eq!(h.store.users().unwrap(), vec![user]);
    assert!(h.store.subscriptions().unwrap().is_empty());
}

#[tokio::test]
async fn session_without_email_is_a_noop() {
    let h = Harness::new();
    let user = h.user("ada@example.com").await;
    h.checkout("cs_1", None, "cus_1", vec![LineItem::recurring(MONTHLY)]);

    let reply = h.deliver("evt_1", "checkout.session.completed", "cs_1").await;

    assert_eq!(reply, WebhookReply::received());
    assert_eq!(h.reload(&user).await, user);
    assert!(h.store.subscriptions().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_price_fails_after_linking_customer() {
    let h = Harness::new();
    let user = h.user("ada@example.com").await;
    h.checkout("cs_1", Some("ada@example.com"), "cus_1", vec![LineItem::recurring("price_weekly")]);

    let reply = h.deliver("evt_1", "checkout.session.completed", "cs_1").await;

    assert_eq!(reply.status, 400);
    assert_eq!(reply.body, "Webhook Error: Invalid Price Id: price_weekly");

    // Earlier writes are not rolled back.
    let user = h.reload(&user).await;
    assert_eq!(user.customer_id.as_deref(), Some("cus_1"));
    assert_eq!(user.plan, Plan::Free);
    assert!(h.store.subscriptions().unwrap().is_empty());
}

#[tokio::test]
async fn one_time_purchase_still_grants_premium() {
    let h = Harness::new();
    let user = h.user("ada@example.com").await;
    h.checkout("cs_1", Some("ada@example.com"), "cus_1", vec![LineItem::one_time("price_lifetime")]);

    let reply = h.deliver("evt_1", "checkout.session.completed", "cs_1").await;

    assert!(reply.is_success());
    assert_eq!(h.reload(&user).await.plan, Plan::Premium);
    assert!(h.store.subscriptions().unwrap().is_empty());
}

#[tokio::test]
async fn subscription_deleted_downgrades_and_keeps_row() {
    let h = Harness::new();
    let user = h.user("ada@example.com").await;
    h.checkout("cs_1", Some("ada@example.com"), "cus_1", vec![LineItem::recurring(MONTHLY)]);
    assert!(h.deliver("evt_1", "checkout.session.completed", "cs_1").await.is_success());
    let before = h.store.find_subscription(user.id).await.unwrap().unwrap();

    h.provider
        .insert_subscription(SubscriptionDetails {
            id: "sub_1".into(),
            customer_id: "cus_1".into(),
        })
        .unwrap();
    let reply = h.deliver("evt_2", "customer.subscription.deleted", "sub_1").await;

    assert_eq!(reply, WebhookReply::received());
    assert_eq!(h.reload(&user).await.plan, Plan::Free);
    let after = h.store.find_subscription(user.id).await.unwrap().unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn subscription_deleted_for_unknown_customer_fails() {
    let h = Harness::new();
    let user = h.user("ada@example.com").await;
    h.provider
        .insert_subscription(SubscriptionDetails {
            id: "sub_1".into(),
            customer_id: "cus_unknown".into(),
        })
        .unwrap();

    let reply = h.deliver("evt_1", "customer.subscription.deleted", "sub_1").await;

    assert_eq!(reply.status, 400);
    assert_eq!(reply.body, "Webhook Error: User not found for customer cus_unknown");
    assert_eq!(h.reload(&user).await, user);
}

#[tokio::test]
async fn unhandled_event_is_acknowledged() {
    let h = Harness::new();
    let user = h.user("ada@example.com").await;

    let reply = h.deliver("evt_1", "invoice.payment_succeeded", "in_1").await;

    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, "Payment Received!");
    assert_eq!(h.store.users().unwrap(), vec![user]);
    assert!(h.store.subscriptions().unwrap().is_empty());
}

#[tokio::test]
async fn provider_lookup_failure_is_rejected() {
    let h = Harness::new();
    h.user("ada@example.com").await;

    let reply = h.deliver("evt_1", "checkout.session.completed", "cs_missing").await;

    assert_eq!(reply.status, 400);
    assert!(reply.body.contains("cs_missing"));
}

#[tokio::test]
async fn missing_secret_rejects_everything() {
    let h = Harness::with_config(ReconcilerConfig::default());
    h.user("ada@example.com").await;

    let reply = h.deliver("evt_1", "invoice.paid", "in_1").await;

    assert_eq!(reply.status, 400);
}
