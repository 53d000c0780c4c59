use axum::{extract::State, middleware, routing::get, Extension, Router};
use serde::Serialize;

use crate::config::RateLimitConfig;
use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path};
use crate::middleware::{require_session, CurrentUser};
use crate::models::Order;
use crate::rate_limit;

#[derive(Serialize)]
pub struct OrderListResponse {
    pub success: bool,
    pub orders: Vec<Order>,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub success: bool,
    pub order: Order,
}

/// List the caller's orders, newest first.
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<OrderListResponse>> {
    let conn = state.db.get()?;
    let orders = queries::list_orders_for_user(&conn, &user.id)?;

    Ok(Json(OrderListResponse {
        success: true,
        orders,
    }))
}

/// Fetch one order. The lookup is ownership-scoped, so another user's
/// order is indistinguishable from a nonexistent one.
pub async fn get_order(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>> {
    let conn = state.db.get()?;
    let order =
        queries::get_order_for_user(&conn, &order_id, &user.id)?.ok_or(AppError::NotFound)?;

    Ok(Json(OrderResponse {
        success: true,
        order,
    }))
}

pub fn router(state: AppState, rate: RateLimitConfig) -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/{order_id}", get(get_order))
        .route_layer(middleware::from_fn_with_state(state, require_session))
        .layer(rate_limit::standard_layer(rate.standard_rpm))
}
