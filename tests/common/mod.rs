//! Test utilities and fixtures for Darkroom integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

pub use darkroom::coordinator::PaymentCoordinator;
pub use darkroom::db::{init_db, queries, AppState, DbPool};
pub use darkroom::error::{AppError, Result};
pub use darkroom::handlers::{orders, payments, webhook};
pub use darkroom::middleware::require_session;
pub use darkroom::models::*;
pub use darkroom::payments::{
    CreateIntent, IntentStatus, PaymentIntent, PaymentProcessor, StripeClient, StripeConfig,
};

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Create a pooled in-memory database with the schema initialized.
///
/// Uses a uniquely named shared-cache memory database so every pool
/// connection sees the same data (plain `:memory:` would give each
/// connection its own empty database).
pub fn memory_pool() -> DbPool {
    let uri = format!(
        "file:testdb_{}?mode=memory&cache=shared",
        uuid::Uuid::new_v4().simple()
    );
    let manager = SqliteConnectionManager::file(uri)
        .with_init(|c| c.busy_timeout(Duration::from_secs(5)));
    let pool = Pool::builder()
        .max_size(4)
        .build(manager)
        .expect("Failed to create test pool");
    {
        let conn = pool.get().expect("Failed to get test connection");
        init_db(&conn).expect("Failed to initialize schema");
    }
    pool
}

pub fn create_test_user(conn: &Connection, email: &str) -> User {
    queries::create_user(
        conn,
        &CreateUser {
            email: email.to_string(),
        },
    )
    .expect("Failed to create test user")
}

/// Create a user together with an open session, returning the Bearer token.
pub fn create_test_user_with_session(conn: &Connection, email: &str) -> (User, String) {
    let user = create_test_user(conn, email);
    let token = queries::create_session(conn, &user.id, 3600).expect("Failed to create session");
    (user, token)
}

pub fn create_test_order(conn: &Connection, user_id: &str, total_amount_cents: i64) -> Order {
    queries::create_order(
        conn,
        user_id,
        &CreateOrder {
            total_amount_cents,
            line_items: Some(r#"[{"sku":"print-a3-matte","qty":1}]"#.to_string()),
        },
    )
    .expect("Failed to create test order")
}

pub fn get_order(pool: &DbPool, order_id: &str, user_id: &str) -> Order {
    let conn = pool.get().unwrap();
    queries::get_order_for_user(&conn, order_id, user_id)
        .expect("Order lookup failed")
        .expect("Order should exist")
}

// ============ Fake payment processor ============

#[derive(Debug, Clone)]
pub struct FakeIntent {
    pub id: String,
    pub status: IntentStatus,
    pub client_secret: String,
    pub amount_cents: i64,
    pub currency: String,
}

#[derive(Default)]
struct FakeInner {
    intents: Vec<FakeIntent>,
    created: usize,
    canceled: Vec<String>,
    retrieve_fails: bool,
    create_fails: bool,
}

/// In-memory stand-in for the payment processor. Records every intent it
/// creates so tests can assert on amounts and duplicate creation.
#[derive(Default)]
pub struct FakeProcessor {
    inner: Mutex<FakeInner>,
}

impl FakeProcessor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn created_count(&self) -> usize {
        self.inner.lock().unwrap().created
    }

    pub fn canceled_ids(&self) -> Vec<String> {
        self.inner.lock().unwrap().canceled.clone()
    }

    pub fn intent(&self, id: &str) -> Option<FakeIntent> {
        self.inner
            .lock()
            .unwrap()
            .intents
            .iter()
            .find(|i| i.id == id)
            .cloned()
    }

    pub fn last_intent(&self) -> Option<FakeIntent> {
        self.inner.lock().unwrap().intents.last().cloned()
    }

    /// Simulate the intent being canceled upstream (e.g. expired).
    pub fn cancel_upstream(&self, id: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(i) = inner.intents.iter_mut().find(|i| i.id == id) {
            i.status = IntentStatus::Canceled;
        }
    }

    /// Make `retrieve_intent` fail, as if the intent expired upstream.
    pub fn set_retrieve_fails(&self, fails: bool) {
        self.inner.lock().unwrap().retrieve_fails = fails;
    }

    /// Make `create_intent` fail, as if the processor API is down.
    pub fn set_create_fails(&self, fails: bool) {
        self.inner.lock().unwrap().create_fails = fails;
    }
}

#[async_trait]
impl PaymentProcessor for FakeProcessor {
    async fn create_intent(&self, input: &CreateIntent) -> Result<PaymentIntent> {
        // Suspend before touching state so two concurrent begin-payment
        // calls both get past the "no existing intent" check.
        tokio::task::yield_now().await;

        let mut inner = self.inner.lock().unwrap();
        if inner.create_fails {
            return Err(AppError::Internal("fake processor unavailable".into()));
        }

        inner.created += 1;
        let id = format!("pi_test_{}", inner.created);
        let client_secret = format!("{}_secret", id);
        inner.intents.push(FakeIntent {
            id: id.clone(),
            status: IntentStatus::RequiresPaymentMethod,
            client_secret: client_secret.clone(),
            amount_cents: input.amount_cents,
            currency: input.currency.clone(),
        });

        Ok(PaymentIntent {
            id,
            status: IntentStatus::RequiresPaymentMethod,
            client_secret,
        })
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent> {
        let inner = self.inner.lock().unwrap();
        if inner.retrieve_fails {
            return Err(AppError::Internal("fake retrieve failure".into()));
        }
        inner
            .intents
            .iter()
            .find(|i| i.id == intent_id)
            .map(|i| PaymentIntent {
                id: i.id.clone(),
                status: i.status,
                client_secret: i.client_secret.clone(),
            })
            .ok_or_else(|| AppError::Internal("no such intent".into()))
    }

    async fn cancel_intent(&self, intent_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(i) = inner.intents.iter_mut().find(|i| i.id == intent_id) {
            i.status = IntentStatus::Canceled;
        }
        inner.canceled.push(intent_id.to_string());
        Ok(())
    }
}

// ============ App wiring ============

pub fn make_coordinator(pool: DbPool, processor: Arc<FakeProcessor>) -> PaymentCoordinator {
    PaymentCoordinator::new(pool, processor, "usd".to_string())
}

/// AppState over an in-memory pool with the fake processor injected.
pub fn test_state(pool: DbPool, processor: Arc<FakeProcessor>) -> AppState {
    let stripe = StripeClient::new(&StripeConfig {
        secret_key: "sk_test_xxx".to_string(),
        webhook_secret: TEST_WEBHOOK_SECRET.to_string(),
    });
    AppState {
        db: pool.clone(),
        coordinator: make_coordinator(pool, processor),
        stripe,
    }
}

/// Router with all endpoints, without rate limiting (tests hit limits fast).
pub fn test_app(state: AppState) -> Router {
    Router::new()
        .route("/payments/create-intent", post(payments::create_intent))
        .route("/orders", get(orders::list_orders))
        .route("/orders/{order_id}", get(orders::get_order))
        .route_layer(from_fn_with_state(state.clone(), require_session))
        .route("/payments/webhook", post(webhook::handle_stripe_webhook))
        .with_state(state)
}

// ============ Webhook payload helpers ============

/// Get current Unix timestamp as a string (for webhook signature tests)
pub fn current_timestamp() -> String {
    chrono::Utc::now().timestamp().to_string()
}

/// Get an old timestamp, beyond the 5-minute tolerance
pub fn old_timestamp() -> String {
    (chrono::Utc::now().timestamp() - 600).to_string()
}

pub fn compute_stripe_signature(payload: &[u8], secret: &str, timestamp: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(signed_payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// A correctly signed `stripe-signature` header for `payload`.
pub fn signed_header(payload: &[u8]) -> String {
    let timestamp = current_timestamp();
    let signature = compute_stripe_signature(payload, TEST_WEBHOOK_SECRET, &timestamp);
    format!("t={},v1={}", timestamp, signature)
}

/// A minimal payment_intent event payload as Stripe delivers it.
pub fn intent_event_payload(event_type: &str, intent_id: &str, status: &str) -> String {
    serde_json::json!({
        "id": format!("evt_{}", uuid::Uuid::new_v4().simple()),
        "type": event_type,
        "data": {
            "object": {
                "id": intent_id,
                "object": "payment_intent",
                "status": status,
            }
        }
    })
    .to_string()
}
