//! REST routing layer.

use axum::routing::get;
use axum::{Json, Router};

use crate::AppState;

pub mod cart;
pub mod categories;
pub mod chat;
pub mod orders;
pub mod products;
pub mod sliders;
pub mod users;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/api/products", products::router())
        .nest("/api/categories", categories::router())
        .nest("/api/sliders", sliders::router())
        .nest("/api/cart", cart::router())
        .nest("/api/orders", orders::router())
        .nest("/api/chat", chat::router())
        .nest("/api/users", users::router())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy", "service": "storefront" }))
}
