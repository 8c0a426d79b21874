//! Collaborator seams of the order lifecycle engine.
//!
//! The engine talks to the catalog, the cart collection, and the order
//! collection through these traits. `PgCatalog`/`PgCarts`/`PgOrders` back
//! them in production; the `memory` module supplies test implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{CartLine, Product, ShippingAddress};
use crate::orders::status::OrderStatus;

/// A (product, quantity) pair for a stock movement.
#[derive(Clone, Copy, Debug)]
pub struct StockLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Immutable snapshot of one order line, fixed at creation time.
#[derive(Clone, Debug, Serialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub name: String,
    pub price: i64,
    pub quantity: i32,
}

impl OrderItem {
    pub fn subtotal(&self) -> i64 {
        self.price * i64::from(self.quantity)
    }

    pub fn stock_line(&self) -> StockLine {
        StockLine {
            product_id: self.product_id,
            quantity: self.quantity,
        }
    }
}

/// Owner display data snapshotted onto the order.
#[derive(Clone, Debug, Serialize)]
pub struct OrderUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user: OrderUser,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub total: i64,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn stock_lines(&self) -> Vec<StockLine> {
        self.items.iter().map(OrderItem::stock_line).collect()
    }
}

/// Fields of an order about to be persisted.
#[derive(Clone, Debug)]
pub struct NewOrder {
    pub user: OrderUser,
    pub items: Vec<OrderItem>,
    pub total: i64,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
}

/// One page of the admin order listing.
#[derive(Clone, Debug, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: i64,
    pub total_pages: i64,
    pub current_page: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderStats {
    pub total_orders: i64,
    pub pending_orders: i64,
    /// Sum of `total` over every non-cancelled order.
    pub total_revenue: i64,
    pub recent_orders: Vec<Order>,
}

/// Product lookup and stock movement.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>>;

    /// Deducts stock for every line or none at all.
    ///
    /// Availability is checked and applied in a single atomic step per call,
    /// so two concurrent deductions of the same product cannot both succeed
    /// past the remaining stock. Fails with `InsufficientStock` naming the
    /// first short line, or `NotFound` if a product has vanished.
    async fn deduct_stock(&self, lines: &[StockLine]) -> Result<()>;

    /// Returns every line's quantity to its product, atomically.
    async fn restore_stock(&self, lines: &[StockLine]) -> Result<()>;
}

/// Read/clear access to a user's cart.
#[async_trait]
pub trait Carts: Send + Sync {
    async fn lines_for(&self, user_id: Uuid) -> Result<Vec<CartLine>>;
    async fn clear(&self, user_id: Uuid) -> Result<()>;
}

/// The persisted order collection.
#[async_trait]
pub trait Orders: Send + Sync {
    async fn insert(&self, order: NewOrder) -> Result<Order>;
    async fn find(&self, id: Uuid) -> Result<Option<Order>>;
    async fn set_status(&self, id: Uuid, status: OrderStatus) -> Result<Order>;
    /// A user's orders, newest first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>>;
    /// Admin listing, newest first, optionally filtered by status.
    async fn list(
        &self,
        status: Option<OrderStatus>,
        page: u32,
        limit: u32,
    ) -> Result<OrderPage>;
    async fn stats(&self) -> Result<OrderStats>;
    /// Deletes cancelled orders last modified before `cutoff`; returns the
    /// number removed.
    async fn delete_stale_cancelled(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}
