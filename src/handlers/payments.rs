use axum::{extract::State, http::HeaderMap, middleware, routing::post, Extension, Router};
use serde::{Deserialize, Serialize};

use crate::config::RateLimitConfig;
use crate::db::AppState;
use crate::error::Result;
use crate::extractors::Json;
use crate::middleware::{require_session, CurrentUser};
use crate::rate_limit;

/// Request body for intent creation. Only the order id is accepted -
/// any `amount` a client might send is ignored by construction, since the
/// charge amount is read from the order row.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentRequest {
    pub order_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentResponse {
    pub success: bool,
    pub client_secret: String,
}

/// Best-effort client IP for intent metadata. The service runs behind a
/// reverse proxy, so the peer address is not the client's.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
}

pub async fn create_intent(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    headers: HeaderMap,
    Json(request): Json<CreateIntentRequest>,
) -> Result<Json<CreateIntentResponse>> {
    let client_secret = state
        .coordinator
        .begin_payment(&user.id, &request.order_id, client_ip(&headers))
        .await?;

    Ok(Json(CreateIntentResponse {
        success: true,
        client_secret,
    }))
}

pub fn router(state: AppState, rate: RateLimitConfig) -> Router<AppState> {
    Router::new()
        .route("/payments/create-intent", post(create_intent))
        .route_layer(middleware::from_fn_with_state(state, require_session))
        .layer(rate_limit::strict_layer(rate.strict_rpm))
}
