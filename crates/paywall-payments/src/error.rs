//! Payment Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
///
/// Every variant is terminal for the event being processed: the webhook
/// endpoint answers 400 with the `Display` text and nothing is retried here.
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    SignatureInvalid(String),

    /// No local user matches the provider's customer reference
    #[error("User not found for {0}")]
    UserNotFound(String),

    /// A recurring price matched neither configured price id
    #[error("Invalid Price Id: {0}")]
    InvalidPriceId(String),

    /// Persistence layer failure
    #[error("Storage error: {0}")]
    Store(String),

    /// Stripe API error
    #[error("Stripe error: {0}")]
    Provider(String),

    /// Verified payload did not carry the object its event type implies
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PaymentError {
    /// Whether the provider's redelivery could plausibly succeed
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Provider(_) | Self::Store(_))
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for PaymentError {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(err.to_string())
    }
}
