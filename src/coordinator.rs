//! Order-payment coordinator: maps each order to at most one live payment
//! intent and applies webhook-driven status transitions.
//!
//! State machine for `Order.payment_status`:
//!
//! ```text
//! pending --[begin_payment creates/reuses intent]--> pending (intent attached)
//! pending --[verified webhook: intent succeeded]--> succeeded   (terminal)
//! pending --[verified webhook: intent failed]--> failed  (may retry payment)
//! pending --[intent canceled upstream]--> pending (intent replaced on next begin_payment)
//! ```

use std::sync::Arc;

use uuid::Uuid;

use crate::db::{queries, DbPool};
use crate::error::{AppError, Result};
use crate::models::{Order, PaymentStatus};
use crate::payments::{CreateIntent, IntentStatus, PaymentProcessor};

#[derive(Clone)]
pub struct PaymentCoordinator {
    db: DbPool,
    processor: Arc<dyn PaymentProcessor>,
    currency: String,
}

impl PaymentCoordinator {
    pub fn new(db: DbPool, processor: Arc<dyn PaymentProcessor>, currency: String) -> Self {
        Self {
            db,
            processor,
            currency,
        }
    }

    /// Produce a client secret for paying `order_id`, guaranteeing the
    /// charged amount is the order row's total and that at most one
    /// non-canceled intent exists per order.
    ///
    /// Repeat calls reuse the stored intent; a canceled or unretrievable
    /// intent is replaced. Concurrent calls race on a compare-and-swap of
    /// `payment_intent_id` - the loser cancels its own intent and returns
    /// the winner's secret.
    pub async fn begin_payment(
        &self,
        user_id: &str,
        order_id: &str,
        client_ip: Option<String>,
    ) -> Result<String> {
        if order_id.is_empty() || Uuid::parse_str(order_id).is_err() {
            return Err(AppError::InvalidRequest("Invalid order id".into()));
        }

        let order = {
            let conn = self.db.get()?;
            queries::get_order_for_user(&conn, order_id, user_id)?.ok_or(AppError::NotFound)?
        };

        if order.payment_status == PaymentStatus::Succeeded {
            return Err(AppError::AlreadyPaid);
        }

        // Reuse the stored intent if it is still live. A retrieval failure
        // or canceled status falls through to creation - a stale intent
        // must not block checkout.
        let mut stale_intent_id: Option<String> = None;
        if let Some(ref intent_id) = order.payment_intent_id {
            match self.processor.retrieve_intent(intent_id).await {
                Ok(intent) if intent.status != IntentStatus::Canceled => {
                    return Ok(intent.client_secret);
                }
                Ok(_) => {
                    tracing::info!(
                        "Intent {} for order {} was canceled upstream, creating a new one",
                        intent_id,
                        order.id
                    );
                    stale_intent_id = Some(intent_id.clone());
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to retrieve intent {} for order {}: {} - creating a new one",
                        intent_id,
                        order.id,
                        e
                    );
                    stale_intent_id = Some(intent_id.clone());
                }
            }
        }

        // Amount comes from the order row, never from the request.
        let intent = self
            .processor
            .create_intent(&CreateIntent {
                amount_cents: order.total_amount_cents,
                currency: self.currency.clone(),
                order_id: order.id.clone(),
                user_id: user_id.to_string(),
                client_ip,
                line_items: order.line_items.clone(),
            })
            .await?;

        let attached = {
            let conn = self.db.get()?;
            match stale_intent_id {
                None => queries::try_attach_payment_intent(&conn, &order.id, user_id, &intent.id)?,
                Some(ref old) => {
                    queries::try_replace_payment_intent(&conn, &order.id, user_id, old, &intent.id)?
                }
            }
        };

        if attached {
            return Ok(intent.client_secret);
        }

        // Lost the attach race: another request persisted its intent first.
        // Our intent is now an orphan - cancel it best-effort and hand back
        // whatever the winner attached.
        tracing::info!(
            "Lost intent attach race for order {}, canceling orphan intent {}",
            order.id,
            intent.id
        );
        if let Err(e) = self.processor.cancel_intent(&intent.id).await {
            tracing::warn!("Failed to cancel orphan intent {}: {}", intent.id, e);
        }

        let current: Order = {
            let conn = self.db.get()?;
            queries::get_order_for_user(&conn, &order.id, user_id)?.ok_or_else(|| {
                AppError::Internal(format!("Order {} vanished during payment", order.id))
            })?
        };

        if current.payment_status == PaymentStatus::Succeeded {
            return Err(AppError::AlreadyPaid);
        }

        let winner_id = current.payment_intent_id.ok_or_else(|| {
            AppError::Internal(format!(
                "Order {} lost intent race but has no intent attached",
                order.id
            ))
        })?;

        let winner = self.processor.retrieve_intent(&winner_id).await?;
        Ok(winner.client_secret)
    }

    /// Apply a verified `payment_intent.succeeded` event.
    ///
    /// Idempotent: the status write sets the same value on redelivery. An
    /// intent with no matching order is logged and acknowledged - the
    /// webhook must never fail over an application-level mismatch.
    pub fn handle_payment_succeeded(&self, intent_id: &str) -> Result<()> {
        let conn = self.db.get()?;
        if queries::mark_order_paid_by_intent(&conn, intent_id)? {
            tracing::info!("Order paid: intent={}", intent_id);
        } else {
            tracing::warn!("Payment succeeded for unknown intent: {}", intent_id);
        }
        Ok(())
    }

    /// Apply a verified `payment_intent.payment_failed` event. Only a
    /// pending order moves to `failed`; a late failure never downgrades a
    /// succeeded order.
    pub fn handle_payment_failed(&self, intent_id: &str) -> Result<()> {
        let conn = self.db.get()?;
        if queries::mark_order_failed_by_intent(&conn, intent_id)? {
            tracing::info!("Order payment failed: intent={}", intent_id);
        } else {
            tracing::debug!(
                "Payment failed event for unknown or non-pending intent: {}",
                intent_id
            );
        }
        Ok(())
    }
}
