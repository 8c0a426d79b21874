//! In-memory implementations of the collaborator traits for testing.
//!
//! Same contracts as the PostgreSQL implementations: `deduct_stock` holds the
//! write lock across the availability check and the mutation, so it is
//! all-or-nothing per call.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{CartLine, Product};
use crate::orders::engine::order_number;
use crate::orders::status::OrderStatus;
use crate::orders::store::{
    Carts, Catalog, NewOrder, Order, OrderPage, OrderStats, Orders, StockLine,
};

#[derive(Clone, Default)]
pub struct MemoryCatalog {
    products: Arc<RwLock<HashMap<Uuid, Product>>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_product(&self, product: Product) {
        self.products.write().await.insert(product.id, product);
    }

    pub async fn stock_of(&self, id: Uuid) -> Option<i32> {
        self.products.read().await.get(&id).map(|p| p.stock)
    }

    pub async fn set_price(&self, id: Uuid, price: i64) {
        if let Some(product) = self.products.write().await.get_mut(&id) {
            product.price = price;
        }
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn deduct_stock(&self, lines: &[StockLine]) -> Result<()> {
        let mut products = self.products.write().await;
        // Validate every line before touching anything.
        for line in lines {
            let product = products
                .get(&line.product_id)
                .ok_or_else(|| Error::not_found("Product"))?;
            if product.stock < line.quantity {
                return Err(Error::InsufficientStock {
                    name: product.name.clone(),
                    available: product.stock,
                    requested: line.quantity,
                });
            }
        }
        for line in lines {
            let product = products.get_mut(&line.product_id).unwrap();
            product.stock -= line.quantity;
        }
        Ok(())
    }

    async fn restore_stock(&self, lines: &[StockLine]) -> Result<()> {
        let mut products = self.products.write().await;
        for line in lines {
            if let Some(product) = products.get_mut(&line.product_id) {
                product.stock += line.quantity;
            }
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryCarts {
    carts: Arc<RwLock<HashMap<Uuid, Vec<CartLine>>>>,
}

impl MemoryCarts {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_cart(&self, user_id: Uuid, lines: Vec<CartLine>) {
        self.carts.write().await.insert(user_id, lines);
    }

    pub async fn is_empty(&self, user_id: Uuid) -> bool {
        self.carts
            .read()
            .await
            .get(&user_id)
            .map_or(true, Vec::is_empty)
    }
}

#[async_trait]
impl Carts for MemoryCarts {
    async fn lines_for(&self, user_id: Uuid) -> Result<Vec<CartLine>> {
        Ok(self.carts.read().await.get(&user_id).cloned().unwrap_or_default())
    }

    async fn clear(&self, user_id: Uuid) -> Result<()> {
        self.carts.write().await.remove(&user_id);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryOrders {
    orders: Arc<RwLock<HashMap<Uuid, Order>>>,
}

impl MemoryOrders {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.orders.read().await.contains_key(&id)
    }

    /// Rewrites an order's `updated_at`, for retention tests.
    pub async fn backdate(&self, id: Uuid, updated_at: DateTime<Utc>) {
        if let Some(order) = self.orders.write().await.get_mut(&id) {
            order.updated_at = updated_at;
        }
    }

    fn sorted_desc(mut orders: Vec<Order>) -> Vec<Order> {
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }
}

#[async_trait]
impl Orders for MemoryOrders {
    async fn insert(&self, order: NewOrder) -> Result<Order> {
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            order_number: order_number(),
            user: order.user,
            status: OrderStatus::Pending,
            items: order.items,
            total: order.total,
            shipping_address: order.shipping_address,
            payment_method: order.payment_method,
            created_at: now,
            updated_at: now,
        };
        self.orders.write().await.insert(order.id, order.clone());
        Ok(order)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn set_status(&self, id: Uuid, status: OrderStatus) -> Result<Order> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(&id).ok_or_else(|| Error::not_found("Order"))?;
        order.status = status;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(Self::sorted_desc(
            orders
                .values()
                .filter(|o| o.user.id == user_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list(
        &self,
        status: Option<OrderStatus>,
        page: u32,
        limit: u32,
    ) -> Result<OrderPage> {
        let page = page.max(1);
        let limit = limit.max(1) as usize;
        let orders = self.orders.read().await;
        let filtered = Self::sorted_desc(
            orders
                .values()
                .filter(|o| status.map_or(true, |s| o.status == s))
                .cloned()
                .collect(),
        );
        let total = filtered.len() as i64;
        let start = (page as usize - 1) * limit;
        let orders = filtered.into_iter().skip(start).take(limit).collect();
        Ok(OrderPage {
            orders,
            total,
            total_pages: (total + limit as i64 - 1) / limit as i64,
            current_page: page,
        })
    }

    async fn stats(&self) -> Result<OrderStats> {
        let orders = self.orders.read().await;
        let all: Vec<Order> = orders.values().cloned().collect();
        let total_orders = all.len() as i64;
        let pending_orders = all
            .iter()
            .filter(|o| o.status == OrderStatus::Pending)
            .count() as i64;
        let total_revenue = all
            .iter()
            .filter(|o| o.status != OrderStatus::Cancelled)
            .map(|o| o.total)
            .sum();
        let recent_orders = Self::sorted_desc(all).into_iter().take(5).collect();
        Ok(OrderStats {
            total_orders,
            pending_orders,
            total_revenue,
            recent_orders,
        })
    }

    async fn delete_stale_cancelled(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut orders = self.orders.write().await;
        let before = orders.len();
        orders.retain(|_, o| !(o.status == OrderStatus::Cancelled && o.updated_at < cutoff));
        Ok((before - orders.len()) as u64)
    }
}
