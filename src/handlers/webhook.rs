//! Stripe webhook endpoint.
//!
//! Trust is established by signature verification over the exact raw body
//! bytes - this route must never go through JSON body parsing. Once a
//! payload verifies, the endpoint always acknowledges with 2xx; the only
//! non-2xx path is a missing or invalid signature.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;

use crate::db::AppState;
use crate::payments::{StripeIntentObject, StripeWebhookEvent};

#[derive(Serialize)]
struct WebhookAck {
    received: bool,
}

/// Verified webhook events the coordinator cares about. Everything else is
/// acknowledged without action so the processor never retries over an
/// event type we do not handle.
#[derive(Debug, PartialEq, Eq)]
pub enum WebhookEvent {
    IntentSucceeded(String),
    IntentFailed(String),
    Ignored,
}

/// Parse a verified payload into a `WebhookEvent`.
pub fn parse_event(body: &[u8]) -> Result<WebhookEvent, serde_json::Error> {
    let event: StripeWebhookEvent = serde_json::from_slice(body)?;

    match event.event_type.as_str() {
        "payment_intent.succeeded" => {
            let intent: StripeIntentObject = serde_json::from_value(event.data.object)?;
            Ok(WebhookEvent::IntentSucceeded(intent.id))
        }
        "payment_intent.payment_failed" => {
            let intent: StripeIntentObject = serde_json::from_value(event.data.object)?;
            Ok(WebhookEvent::IntentFailed(intent.id))
        }
        _ => Ok(WebhookEvent::Ignored),
    }
}

fn ack() -> Response {
    Json(WebhookAck { received: true }).into_response()
}

pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = match headers.get("stripe-signature").and_then(|v| v.to_str().ok()) {
        Some(s) => s,
        None => {
            return (StatusCode::BAD_REQUEST, "Missing stripe-signature header").into_response();
        }
    };

    match state.stripe.verify_webhook_signature(&body, signature) {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("Stripe webhook rejected: invalid signature");
            return (StatusCode::BAD_REQUEST, "Invalid signature").into_response();
        }
        Err(e) => {
            tracing::warn!("Stripe webhook rejected: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid signature header").into_response();
        }
    }

    // Verified from here on. Anomalies are logged and acknowledged - a
    // non-2xx would only trigger redelivery of a payload that cannot change.
    let event = match parse_event(&body) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to parse verified Stripe webhook: {}", e);
            return ack();
        }
    };

    let result = match event {
        WebhookEvent::IntentSucceeded(intent_id) => {
            state.coordinator.handle_payment_succeeded(&intent_id)
        }
        WebhookEvent::IntentFailed(intent_id) => {
            state.coordinator.handle_payment_failed(&intent_id)
        }
        WebhookEvent::Ignored => Ok(()),
    };

    if let Err(e) = result {
        tracing::error!("Webhook processing error: {}", e);
    }

    ack()
}

pub fn router() -> Router<AppState> {
    Router::new().route("/payments/webhook", post(handle_stripe_webhook))
}
