use chrono::Utc;
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

use super::from_row::{query_all, query_one, ORDER_COLS, SESSION_COLS, USER_COLS};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

// ============ Users & Sessions ============

pub fn create_user(conn: &Connection, input: &CreateUser) -> Result<User> {
    let id = gen_id();
    let created_at = now();

    conn.execute(
        "INSERT INTO users (id, email, created_at) VALUES (?1, ?2, ?3)",
        params![&id, &input.email, created_at],
    )?;

    Ok(User {
        id,
        email: input.email.clone(),
        created_at,
    })
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

pub fn hash_session_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Create a session for a user, returning the plaintext Bearer token.
/// Only the hash is persisted.
pub fn create_session(conn: &Connection, user_id: &str, ttl_secs: i64) -> Result<String> {
    let token = format!("drs_{}", Uuid::new_v4().simple());
    let created_at = now();

    conn.execute(
        "INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            hash_session_token(&token),
            user_id,
            created_at,
            created_at + ttl_secs
        ],
    )?;

    Ok(token)
}

/// Resolve a Bearer token to its user. Expired sessions resolve to None.
pub fn get_session_user(conn: &Connection, token: &str) -> Result<Option<User>> {
    let token_hash = hash_session_token(token);
    let session: Option<Session> = query_one(
        conn,
        &format!(
            "SELECT {} FROM sessions WHERE token_hash = ?1 AND expires_at > ?2",
            SESSION_COLS
        ),
        &[&token_hash, &now()],
    )?;

    match session {
        Some(s) => get_user_by_id(conn, &s.user_id),
        None => Ok(None),
    }
}

// ============ Orders ============

pub fn create_order(conn: &Connection, user_id: &str, input: &CreateOrder) -> Result<Order> {
    let id = gen_id();
    let ts = now();

    conn.execute(
        "INSERT INTO orders (id, user_id, total_amount_cents, payment_status,
                             line_items, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'pending', ?4, ?5, ?5)",
        params![&id, user_id, input.total_amount_cents, &input.line_items, ts],
    )?;

    Ok(Order {
        id,
        user_id: user_id.to_string(),
        total_amount_cents: input.total_amount_cents,
        payment_status: PaymentStatus::Pending,
        payment_intent_id: None,
        line_items: input.line_items.clone(),
        created_at: ts,
        updated_at: ts,
    })
}

/// Ownership-scoped lookup: the order must match BOTH id and owner.
/// Callers must not distinguish "absent" from "not yours".
pub fn get_order_for_user(conn: &Connection, order_id: &str, user_id: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM orders WHERE id = ?1 AND user_id = ?2",
            ORDER_COLS
        ),
        &[&order_id, &user_id],
    )
}

pub fn list_orders_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Order>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM orders WHERE user_id = ?1 ORDER BY created_at DESC",
            ORDER_COLS
        ),
        &[&user_id],
    )
}

/// Atomically attach a payment intent to an order that has none.
///
/// Compare-and-swap on `payment_intent_id IS NULL`: two concurrent
/// begin-payment calls can both create an intent upstream, but only one
/// can persist it. Returns whether this call won.
pub fn try_attach_payment_intent(
    conn: &Connection,
    order_id: &str,
    user_id: &str,
    intent_id: &str,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders SET payment_intent_id = ?1, updated_at = ?2
         WHERE id = ?3 AND user_id = ?4 AND payment_intent_id IS NULL",
        params![intent_id, now(), order_id, user_id],
    )?;
    Ok(affected > 0)
}

/// Atomically replace a stale (canceled or unretrievable) intent with a new
/// one. CAS against the old value so a concurrent replacement cannot
/// clobber a different winner's intent.
pub fn try_replace_payment_intent(
    conn: &Connection,
    order_id: &str,
    user_id: &str,
    old_intent_id: &str,
    new_intent_id: &str,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders SET payment_intent_id = ?1, updated_at = ?2
         WHERE id = ?3 AND user_id = ?4 AND payment_intent_id = ?5",
        params![new_intent_id, now(), order_id, user_id, old_intent_id],
    )?;
    Ok(affected > 0)
}

/// Flip the order whose intent matches to `succeeded`. Setting the same
/// value twice is a no-op, so at-least-once webhook delivery is safe.
/// Returns whether an order matched.
pub fn mark_order_paid_by_intent(conn: &Connection, intent_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders SET payment_status = 'succeeded', updated_at = ?1
         WHERE payment_intent_id = ?2",
        params![now(), intent_id],
    )?;
    Ok(affected > 0)
}

/// Record a terminal payment failure. Only a pending order moves to
/// `failed` - a late failure event never downgrades `succeeded`.
/// Returns whether an order matched (and was still pending).
pub fn mark_order_failed_by_intent(conn: &Connection, intent_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders SET payment_status = 'failed', updated_at = ?1
         WHERE payment_intent_id = ?2 AND payment_status = 'pending'",
        params![now(), intent_id],
    )?;
    Ok(affected > 0)
}
