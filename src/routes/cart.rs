//! Per-user cart endpoints. The cart is read and cleared by the order
//! lifecycle engine on checkout; these routes only mutate lines.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{Error, Result};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", axum::routing::post(add_item))
        .route("/items/:product_id", put(set_quantity).delete(remove_item))
}

/// A cart line joined with its product's current display data.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct CartItemDetail {
    pub product_id: Uuid,
    pub quantity: i32,
    pub name: String,
    pub price: i64,
    pub image: String,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
}

async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<CartItemDetail>>> {
    let items = sqlx::query_as::<_, CartItemDetail>(
        "SELECT ci.product_id, ci.quantity, p.name, p.price, p.image, p.stock, ci.created_at \
         FROM cart_items ci JOIN products p ON p.id = ci.product_id \
         WHERE ci.user_id = $1 ORDER BY ci.created_at",
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(items))
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    if req.quantity < 1 {
        return Err(Error::Validation("Quantity must be at least 1".to_string()));
    }
    let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(req.product_id)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_none() {
        return Err(Error::not_found("Product"));
    }

    sqlx::query(
        "INSERT INTO cart_items (user_id, product_id, quantity) VALUES ($1, $2, $3) \
         ON CONFLICT (user_id, product_id) \
         DO UPDATE SET quantity = cart_items.quantity + $3",
    )
    .bind(user.id)
    .bind(req.product_id)
    .bind(req.quantity)
    .execute(&state.db)
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "message": "Item added to cart" })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: i32,
}

async fn set_quantity(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(req): Json<SetQuantityRequest>,
) -> Result<Json<serde_json::Value>> {
    if req.quantity < 1 {
        return Err(Error::Validation("Quantity must be at least 1".to_string()));
    }
    let updated = sqlx::query(
        "UPDATE cart_items SET quantity = $3 WHERE user_id = $1 AND product_id = $2",
    )
    .bind(user.id)
    .bind(product_id)
    .bind(req.quantity)
    .execute(&state.db)
    .await?;
    if updated.rows_affected() == 0 {
        return Err(Error::not_found("Cart item"));
    }
    Ok(Json(serde_json::json!({ "message": "Cart updated" })))
}

async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let deleted = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
        .bind(user.id)
        .bind(product_id)
        .execute(&state.db)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(Error::not_found("Cart item"));
    }
    Ok(Json(serde_json::json!({ "message": "Item removed from cart" })))
}

async fn clear_cart(State(state): State<AppState>, user: AuthUser) -> Result<StatusCode> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user.id)
        .execute(&state.db)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
