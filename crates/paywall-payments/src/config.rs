//! Reconciler Configuration

use serde::{Deserialize, Serialize};

use crate::account::BillingPeriod;

/// Settings the webhook reconciler needs at runtime
///
/// Missing values are not rejected at construction: an empty secret fails
/// every signature check and an unset price id never matches a line item.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Stripe webhook signing secret (`whsec_...`)
    pub webhook_secret: String,

    /// Price id billed monthly
    pub monthly_price_id: Option<String>,

    /// Price id billed yearly
    pub yearly_price_id: Option<String>,
}

impl ReconcilerConfig {
    pub fn new(
        webhook_secret: impl Into<String>,
        monthly_price_id: impl Into<String>,
        yearly_price_id: impl Into<String>,
    ) -> Self {
        Self {
            webhook_secret: webhook_secret.into(),
            monthly_price_id: Some(monthly_price_id.into()),
            yearly_price_id: Some(yearly_price_id.into()),
        }
    }

    /// Read `WEBHOOK_SECRET`, `STRIPE_MONTHLY_PRICE_ID` and `STRIPE_YEARLY_PRICE_ID`
    pub fn from_env() -> Self {
        let config = Self {
            webhook_secret: std::env::var("WEBHOOK_SECRET").unwrap_or_default(),
            monthly_price_id: std::env::var("STRIPE_MONTHLY_PRICE_ID").ok(),
            yearly_price_id: std::env::var("STRIPE_YEARLY_PRICE_ID").ok(),
        };

        for missing in config.missing_keys() {
            tracing::warn!(key = missing, "Webhook setting not set, events depending on it will fail");
        }

        config
    }

    /// Names of the environment keys that were not provided
    pub fn missing_keys(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.webhook_secret.is_empty() {
            missing.push("WEBHOOK_SECRET");
        }
        if self.monthly_price_id.is_none() {
            missing.push("STRIPE_MONTHLY_PRICE_ID");
        }
        if self.yearly_price_id.is_none() {
            missing.push("STRIPE_YEARLY_PRICE_ID");
        }
        missing
    }

    /// Map a price id onto its billing period
    pub fn period_for_price(&self, price_id: &str) -> Option<BillingPeriod> {
        if self.monthly_price_id.as_deref() == Some(price_id) {
            Some(BillingPeriod::Monthly)
        } else if self.yearly_price_id.as_deref() == Some(price_id) {
            Some(BillingPeriod::Yearly)
        } else {
            None
        }
    }
}
