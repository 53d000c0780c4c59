use serde::Serialize;

/// A Bearer session. Tokens are stored hashed (SHA-256 hex); the plaintext
/// token exists only in the response that created the session.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token_hash: String,
    pub user_id: String,
    pub created_at: i64,
    pub expires_at: i64,
}
