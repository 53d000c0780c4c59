use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Payment lifecycle of an order. `Succeeded` is terminal; `Failed` may
/// retry payment (the next begin-payment reuses or replaces the intent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl FromStr for PaymentStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "succeeded" => Ok(PaymentStatus::Succeeded),
            "failed" => Ok(PaymentStatus::Failed),
            _ => Err(()),
        }
    }
}

/// A persisted purchase record. `total_amount_cents` is authoritative -
/// the charge amount never comes from a client request. `payment_intent_id`
/// is the single source of truth for "is there an in-flight intent".
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub total_amount_cents: i64,
    pub payment_status: PaymentStatus,
    pub payment_intent_id: Option<String>,
    /// JSON summary of the purchased items, forwarded as intent metadata.
    pub line_items: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrder {
    pub total_amount_cents: i64,
    #[serde(default)]
    pub line_items: Option<String>,
}
