//! Storefront - self-hosted e-commerce backend.
//!
//! REST endpoints over PostgreSQL for products, categories, sliders, carts,
//! orders, messaging and accounts. The order lifecycle engine owns the
//! status transition graph and keeps product stock consistent with the set
//! of active orders.

use std::sync::Arc;

use axum::Router;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod models;
pub mod orders;
pub mod routes;

use orders::pg::{PgCarts, PgCatalog, PgOrders};
use orders::{Engine, OrderEngine};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub engine: Arc<Engine>,
}

impl AppState {
    pub fn new(db: PgPool, retention_days: i64) -> Self {
        let engine = OrderEngine::new(
            PgCatalog::new(db.clone()),
            PgCarts::new(db.clone()),
            PgOrders::new(db.clone()),
            retention_days,
        );
        Self {
            db,
            engine: Arc::new(engine),
        }
    }
}

/// Builds the application router with tracing and CORS layers applied.
pub fn app(state: AppState) -> Router {
    routes::router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
