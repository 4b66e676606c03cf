//! Postgres Account Store
//!
//! `users` and `subscriptions` tables, one subscription per user enforced by
//! a unique `user_id`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::account::{AccountStore, Subscription, SubscriptionUpsert, User, UserUpdate};
use crate::error::{PaymentError, Result};

/// Embedded schema migrations
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    customer_id: Option<String>,
    plan: String,
}

impl TryFrom<UserRow> for User {
    type Error = PaymentError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            email: row.email,
            customer_id: row.customer_id,
            plan: row.plan.parse()?,
        })
    }
}

#[derive(Debug, FromRow)]
struct SubscriptionRow {
    id: Uuid,
    user_id: Uuid,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    plan: String,
    period: String,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = PaymentError;

    fn try_from(row: SubscriptionRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            start_date: row.start_date,
            end_date: row.end_date,
            plan: row.plan.parse()?,
            period: row.period.parse()?,
        })
    }
}

/// sqlx-backed [`AccountStore`]
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` and bring the schema up to date
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| PaymentError::Store(format!("migration failed: {e}")))?;
        Ok(Self::new(pool))
    }

    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

const USER_COLUMNS: &str = "id, email, customer_id, plan";
const SUBSCRIPTION_COLUMNS: &str = "id, user_id, start_date, end_date, plan, period";

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn create_user(&self, email: &str) -> Result<User> {
        let user = User::new(email);
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (id, email, customer_id, plan) VALUES ($1, $2, NULL, $3) RETURNING {USER_COLUMNS}"
        ))
        .bind(user.id)
        .bind(&user.email)
        .bind(user.plan.as_str())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_user_by_customer_id(&self, customer_id: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE customer_id = $1"
        ))
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn update_user(&self, user_id: Uuid, update: UserUpdate) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            UPDATE users
            SET customer_id = COALESCE($2, customer_id),
                plan = COALESCE($3, plan)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(update.customer_id)
        .bind(update.plan.map(|plan| plan.as_str()))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| PaymentError::Store(format!("user {user_id} does not exist")))?;

        row.try_into()
    }

    async fn upsert_subscription(&self, upsert: SubscriptionUpsert) -> Result<Subscription> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            r"
            INSERT INTO subscriptions (id, user_id, start_date, end_date, plan, period)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE SET
                start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date,
                plan = EXCLUDED.plan,
                period = EXCLUDED.period
            RETURNING {SUBSCRIPTION_COLUMNS}
            "
        ))
        .bind(Uuid::new_v4())
        .bind(upsert.user_id)
        .bind(upsert.start_date)
        .bind(upsert.end_date)
        .bind(upsert.plan.as_str())
        .bind(upsert.period.as_str())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn find_subscription(&self, user_id: Uuid) -> Result<Option<Subscription>> {
        sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Subscription::try_from)
        .transpose()
    }
}
