mod stripe;

pub use stripe::{StripeClient, StripeConfig, StripeIntentObject, StripeWebhookEvent};

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;

/// Processor-side status of a payment intent. Unrecognized statuses map to
/// `Unknown` rather than failing deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    Succeeded,
    Canceled,
    #[serde(other)]
    Unknown,
}

/// A payment intent as observed from the processor.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: IntentStatus,
    /// Opaque token the storefront uses to complete payment client-side.
    pub client_secret: String,
}

/// Inputs for intent creation. The amount always comes from the order row.
#[derive(Debug, Clone)]
pub struct CreateIntent {
    pub amount_cents: i64,
    pub currency: String,
    pub order_id: String,
    pub user_id: String,
    pub client_ip: Option<String>,
    pub line_items: Option<String>,
}

/// Payment processor seam. The coordinator only ever talks to this trait,
/// so tests can swap in a fake and the Stripe client stays at the edge.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_intent(&self, input: &CreateIntent) -> Result<PaymentIntent>;

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent>;

    /// Cancel an intent. Used best-effort to clean up the loser of a
    /// concurrent attach race; failures are logged, never surfaced.
    async fn cancel_intent(&self, intent_id: &str) -> Result<()>;
}
