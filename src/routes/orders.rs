//! Order endpoints, backed by the order lifecycle engine.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AdminUser, AuthUser};
use crate::error::{Error, Result};
use crate::models::ShippingAddress;
use crate::orders::{Order, OrderPage, OrderStats, OrderStatus};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/my-orders", get(my_orders))
        .route("/stats/overview", get(stats))
        .route("/cleanup", delete(cleanup))
        .route("/:id", get(get_order))
        .route("/:id/status", patch(update_status))
        .route("/:id/cancel", patch(owner_cancel))
        .route("/:id/admin-cancel", patch(admin_cancel))
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub shipping_address: Option<ShippingAddress>,
    pub payment_method: Option<String>,
}

async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let shipping = req
        .shipping_address
        .ok_or_else(|| Error::Validation("Shipping address is required".to_string()))?;
    shipping.validate()?;

    let order = state
        .engine
        .create_order(user.order_user(), shipping, req.payment_method)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn my_orders(State(state): State<AppState>, user: AuthUser) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.engine.orders_for_user(user.id).await?))
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersParams {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

async fn list_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<ListOrdersParams>,
) -> Result<Json<OrderPage>> {
    let status = match params.status.as_deref() {
        None | Some("all") => None,
        Some(value) => Some(OrderStatus::parse(value)?),
    };
    let page = state
        .engine
        .list_orders(status, params.page.unwrap_or(1), params.limit.unwrap_or(10))
        .await?;
    Ok(Json(page))
}

async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>> {
    let order = state.engine.get_order(id, user.id, user.is_admin()).await?;
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

async fn update_status(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Order>> {
    let status = OrderStatus::parse(&req.status)?;
    Ok(Json(state.engine.update_status(id, status).await?))
}

async fn owner_cancel(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>> {
    Ok(Json(state.engine.owner_cancel(id, user.id).await?))
}

async fn admin_cancel(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>> {
    Ok(Json(state.engine.admin_cancel(id).await?))
}

async fn stats(State(state): State<AppState>, _admin: AdminUser) -> Result<Json<OrderStats>> {
    Ok(Json(state.engine.stats().await?))
}

async fn cleanup(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<serde_json::Value>> {
    let deleted = state.engine.run_retention_sweep().await?;
    Ok(Json(serde_json::json!({
        "message": format!("Deleted {deleted} cancelled orders older than the retention window"),
        "deleted_count": deleted,
    })))
}
