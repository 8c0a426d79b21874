//! Order lifecycle engine.
//!
//! Owns the status transition graph and keeps product stock consistent with
//! the set of active (non-cancelled) orders. All stock movements go through
//! the [`Catalog`] trait, whose implementations apply each multi-line
//! movement atomically.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::ShippingAddress;
use crate::orders::status::{plan_transition, OrderStatus, StockEffect};
use crate::orders::store::{
    Carts, Catalog, NewOrder, Order, OrderItem, OrderPage, OrderStats, OrderUser, Orders,
};

pub const DEFAULT_PAYMENT_METHOD: &str = "cash_on_delivery";

pub struct OrderEngine<C, K, O> {
    catalog: C,
    carts: K,
    orders: O,
    retention_days: i64,
}

impl<C: Catalog, K: Carts, O: Orders> OrderEngine<C, K, O> {
    pub fn new(catalog: C, carts: K, orders: O, retention_days: i64) -> Self {
        Self {
            catalog,
            carts,
            orders,
            retention_days,
        }
    }

    /// Converts the user's cart into a pending order.
    ///
    /// Snapshots each line's product name and price, computes the total once,
    /// deducts stock atomically (all lines or none), persists the order and
    /// clears the cart. No mutation happens before every line has been
    /// validated.
    pub async fn create_order(
        &self,
        user: OrderUser,
        shipping_address: ShippingAddress,
        payment_method: Option<String>,
    ) -> Result<Order> {
        let lines = self.carts.lines_for(user.id).await?;
        if lines.is_empty() {
            return Err(Error::Validation("Cart is empty".to_string()));
        }

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let product = self
                .catalog
                .find_product(line.product_id)
                .await?
                .ok_or_else(|| Error::not_found("Product"))?;
            items.push(OrderItem {
                product_id: product.id,
                name: product.name,
                price: product.price,
                quantity: line.quantity,
            });
        }
        let total = items.iter().map(OrderItem::subtotal).sum();

        let stock_lines: Vec<_> = items.iter().map(OrderItem::stock_line).collect();
        self.catalog.deduct_stock(&stock_lines).await?;

        let order = self
            .orders
            .insert(NewOrder {
                user: user.clone(),
                items,
                total,
                shipping_address,
                payment_method: payment_method
                    .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string()),
            })
            .await?;
        self.carts.clear(user.id).await?;

        tracing::info!(
            order_id = %order.id,
            user_id = %user.id,
            total = order.total,
            "order created"
        );
        Ok(order)
    }

    /// Fetches one order; only the owner or an admin may see it.
    pub async fn get_order(&self, id: Uuid, requester: Uuid, is_admin: bool) -> Result<Order> {
        let order = self.find(id).await?;
        if order.user.id != requester && !is_admin {
            return Err(Error::Forbidden);
        }
        Ok(order)
    }

    pub async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
        self.orders.list_for_user(user_id).await
    }

    pub async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        page: u32,
        limit: u32,
    ) -> Result<OrderPage> {
        self.orders.list(status, page, limit).await
    }

    /// Admin status update: applies the full transition table, including the
    /// cancelled → active reactivation path with its stock re-check.
    pub async fn update_status(&self, id: Uuid, new_status: OrderStatus) -> Result<Order> {
        let order = self.find(id).await?;
        match plan_transition(order.status, new_status)? {
            StockEffect::None => {}
            StockEffect::Restore => self.catalog.restore_stock(&order.stock_lines()).await?,
            // Reactivation: the conditional deduct both re-validates
            // availability and takes the stock back in one atomic step.
            StockEffect::RevalidateAndDeduct => {
                self.catalog.deduct_stock(&order.stock_lines()).await?
            }
        }
        let updated = self.orders.set_status(id, new_status).await?;
        tracing::info!(order_id = %id, from = %order.status, to = %new_status, "order status updated");
        Ok(updated)
    }

    /// Owner-initiated cancellation; only permitted while still pending.
    pub async fn owner_cancel(&self, id: Uuid, requester: Uuid) -> Result<Order> {
        let order = self.find(id).await?;
        if order.user.id != requester {
            return Err(Error::Forbidden);
        }
        if order.status != OrderStatus::Pending {
            return Err(Error::Validation(
                "Order cannot be cancelled at this stage".to_string(),
            ));
        }
        self.cancel(order).await
    }

    /// Admin cancellation; any status except delivered or already cancelled.
    pub async fn admin_cancel(&self, id: Uuid) -> Result<Order> {
        let order = self.find(id).await?;
        match order.status {
            OrderStatus::Delivered => {
                return Err(Error::Validation(
                    "Cannot cancel a delivered order".to_string(),
                ))
            }
            OrderStatus::Cancelled => {
                return Err(Error::TerminalState("Order is already cancelled".to_string()))
            }
            _ => {}
        }
        self.cancel(order).await
    }

    async fn find(&self, id: Uuid) -> Result<Order> {
        self.orders
            .find(id)
            .await?
            .ok_or_else(|| Error::not_found("Order"))
    }

    async fn cancel(&self, order: Order) -> Result<Order> {
        self.catalog.restore_stock(&order.stock_lines()).await?;
        let updated = self.orders.set_status(order.id, OrderStatus::Cancelled).await?;
        tracing::info!(order_id = %order.id, "order cancelled, stock restored");
        Ok(updated)
    }

    /// Aggregate order counts, revenue over non-cancelled orders and the five
    /// most recent orders. Pure read.
    pub async fn stats(&self) -> Result<OrderStats> {
        self.orders.stats().await
    }

    /// Deletes cancelled orders older than the retention window. Idempotent.
    pub async fn run_retention_sweep(&self) -> Result<u64> {
        let cutoff = Utc::now() - Duration::days(self.retention_days);
        let deleted = self.orders.delete_stale_cancelled(cutoff).await?;
        if deleted > 0 {
            tracing::info!(deleted, "retention sweep removed stale cancelled orders");
        }
        Ok(deleted)
    }
}

/// Generates a display order number, e.g. `ORD-58203941`.
pub fn order_number() -> String {
    format!("ORD-{:08}", rand::random::<u32>())
}
