//! Accounts and Subscriptions
//!
//! User records, their single subscription row, and the store they live in.

use async_trait::async_trait;
use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::{PaymentError, Result};

/// Access tier cached on the user record
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Premium,
}

impl Plan {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Plan {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "free" => Ok(Self::Free),
            "premium" => Ok(Self::Premium),
            other => Err(PaymentError::Store(format!("unknown plan '{other}'"))),
        }
    }
}

/// How often a subscription is billed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingPeriod {
    Monthly,
    Yearly,
}

impl BillingPeriod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// End of a term that starts at `start`
    ///
    /// Calendar arithmetic: Jan 31 + 1 month lands on the last day of February.
    pub fn term_end(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        let months = match self {
            Self::Monthly => Months::new(1),
            Self::Yearly => Months::new(12),
        };
        start
            .checked_add_months(months)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl std::fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BillingPeriod {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            other => Err(PaymentError::Store(format!("unknown billing period '{other}'"))),
        }
    }
}

/// A registered user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,

    pub email: String,

    /// Stripe customer id, assigned on the first completed checkout
    pub customer_id: Option<String>,

    pub plan: Plan,
}

impl User {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            customer_id: None,
            plan: Plan::Free,
        }
    }
}

/// Partial user update; `None` leaves the column as is
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub customer_id: Option<String>,
    pub plan: Option<Plan>,
}

impl UserUpdate {
    pub fn customer_id(customer_id: impl Into<String>) -> Self {
        Self {
            customer_id: Some(customer_id.into()),
            ..Self::default()
        }
    }

    pub fn plan(plan: Plan) -> Self {
        Self {
            plan: Some(plan),
            ..Self::default()
        }
    }

    fn apply(self, user: &mut User) {
        if let Some(customer_id) = self.customer_id {
            user.customer_id = Some(customer_id);
        }
        if let Some(plan) = self.plan {
            user.plan = plan;
        }
    }
}

/// The one subscription row a user may have
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub plan: Plan,
    pub period: BillingPeriod,
}

/// Full replacement payload for a user's subscription
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionUpsert {
    pub user_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub plan: Plan,
    pub period: BillingPeriod,
}

impl SubscriptionUpsert {
    /// A premium term of `period` starting at `start`
    pub fn premium(user_id: Uuid, period: BillingPeriod, start: DateTime<Utc>) -> Self {
        Self {
            user_id,
            start_date: start,
            end_date: period.term_end(start),
            plan: Plan::Premium,
            period,
        }
    }
}

/// User/subscription persistence
///
/// Each call is atomic on its own; callers get no transaction across calls.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Register a user on the free plan
    async fn create_user(&self, email: &str) -> Result<User>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_user_by_customer_id(&self, customer_id: &str) -> Result<Option<User>>;

    /// Apply a partial update; fails if the user does not exist
    async fn update_user(&self, user_id: Uuid, update: UserUpdate) -> Result<User>;

    /// Create the user's subscription or overwrite every field of the existing one
    async fn upsert_subscription(&self, upsert: SubscriptionUpsert) -> Result<Subscription>;

    async fn find_subscription(&self, user_id: Uuid) -> Result<Option<Subscription>>;
}

/// In-memory account store (for development and tests)
pub struct MemoryAccountStore {
    users: RwLock<HashMap<Uuid, User>>,
    subscriptions: RwLock<HashMap<Uuid, Subscription>>,
}

impl Default for MemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            subscriptions: RwLock::new(HashMap::new()),
        }
    }

    /// Snapshot of every user, ordered by email
    pub fn users(&self) -> Result<Vec<User>> {
        let users = self.users.read().map_err(poisoned)?;
        let mut all: Vec<_> = users.values().cloned().collect();
        all.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(all)
    }

    /// Snapshot of every subscription, ordered by user id
    pub fn subscriptions(&self) -> Result<Vec<Subscription>> {
        let subscriptions = self.subscriptions.read().map_err(poisoned)?;
        let mut all: Vec<_> = subscriptions.values().cloned().collect();
        all.sort_by_key(|s| s.user_id);
        Ok(all)
    }
}

fn poisoned<T>(_: T) -> PaymentError {
    PaymentError::Store("account store lock poisoned".into())
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn create_user(&self, email: &str) -> Result<User> {
        let mut users = self.users.write().map_err(poisoned)?;

        if users.values().any(|u| u.email == email) {
            return Err(PaymentError::Store(format!("email {email} already registered")));
        }

        let user = User::new(email);
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_customer_id(&self, customer_id: &str) -> Result<Option<User>> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users
            .values()
            .find(|u| u.customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn update_user(&self, user_id: Uuid, update: UserUpdate) -> Result<User> {
        let mut users = self.users.write().map_err(poisoned)?;

        if let Some(customer_id) = update.customer_id.as_deref() {
            let taken = users
                .values()
                .any(|u| u.id != user_id && u.customer_id.as_deref() == Some(customer_id));
            if taken {
                return Err(PaymentError::Store(format!(
                    "customer {customer_id} already linked to another user"
                )));
            }
        }

        let user = users
            .get_mut(&user_id)
            .ok_or_else(|| PaymentError::Store(format!("user {user_id} does not exist")))?;
        update.apply(user);
        Ok(user.clone())
    }

    async fn upsert_subscription(&self, upsert: SubscriptionUpsert) -> Result<Subscription> {
        let mut subscriptions = self.subscriptions.write().map_err(poisoned)?;

        let id = subscriptions
            .get(&upsert.user_id)
            .map_or_else(Uuid::new_v4, |existing| existing.id);

        let subscription = Subscription {
            id,
            user_id: upsert.user_id,
            start_date: upsert.start_date,
            end_date: upsert.end_date,
            plan: upsert.plan,
            period: upsert.period,
        };
        subscriptions.insert(upsert.user_id, subscription.clone());
        Ok(subscription)
    }

    async fn find_subscription(&self, user_id: Uuid) -> Result<Option<Subscription>> {
        let subscriptions = self.subscriptions.read().map_err(poisoned)?;
        Ok(subscriptions.get(&user_id).cloned())
    }
}
