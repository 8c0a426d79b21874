//! PostgreSQL-backed implementations of the engine's collaborator traits.
//!
//! Stock movements run inside a single transaction of conditional updates
//! (`stock = stock - q WHERE stock >= q`), so a multi-line deduction either
//! applies completely or not at all, and two concurrent deductions cannot
//! both pass the availability check for the same units.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{CartLine, Product, ShippingAddress};
use crate::orders::engine::order_number;
use crate::orders::status::OrderStatus;
use crate::orders::store::{
    Carts, Catalog, NewOrder, Order, OrderItem, OrderPage, OrderStats, OrderUser, Orders,
    StockLine,
};

#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    async fn deduct_stock(&self, lines: &[StockLine]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for line in lines {
            let updated = sqlx::query(
                "UPDATE products SET stock = stock - $2, updated_at = now() \
                 WHERE id = $1 AND stock >= $2",
            )
            .bind(line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                // Dropping the transaction rolls back earlier decrements.
                let short: Option<(String, i32)> =
                    sqlx::query_as("SELECT name, stock FROM products WHERE id = $1")
                        .bind(line.product_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                return match short {
                    Some((name, available)) => Err(Error::InsufficientStock {
                        name,
                        available,
                        requested: line.quantity,
                    }),
                    None => Err(Error::not_found("Product")),
                };
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn restore_stock(&self, lines: &[StockLine]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for line in lines {
            sqlx::query(
                "UPDATE products SET stock = stock + $2, updated_at = now() WHERE id = $1",
            )
            .bind(line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgCarts {
    pool: PgPool,
}

impl PgCarts {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Carts for PgCarts {
    async fn lines_for(&self, user_id: Uuid) -> Result<Vec<CartLine>> {
        let lines = sqlx::query_as::<_, CartLine>(
            "SELECT product_id, quantity FROM cart_items WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lines)
    }

    async fn clear(&self, user_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgOrders {
    pool: PgPool,
}

impl PgOrders {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads the order items for `rows` in one query and assembles full
    /// orders, preserving row order.
    async fn attach_items(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>> {
        if rows.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let item_rows = sqlx::query_as::<_, ItemRow>(
            "SELECT order_id, product_id, name, price, quantity \
             FROM order_items WHERE order_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            by_order.entry(row.order_id).or_default().push(row.into());
        }
        Ok(rows
            .into_iter()
            .map(|row| {
                let items = by_order.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect())
    }

    async fn load(&self, id: Uuid) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(self.attach_items(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    user_id: Uuid,
    username: String,
    email: String,
    status: OrderStatus,
    total: i64,
    shipping_address: Json<ShippingAddress>,
    payment_method: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            order_number: self.order_number,
            user: OrderUser {
                id: self.user_id,
                username: self.username,
                email: self.email,
            },
            status: self.status,
            items,
            total: self.total,
            shipping_address: self.shipping_address.0,
            payment_method: self.payment_method,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    order_id: Uuid,
    product_id: Uuid,
    name: String,
    price: i64,
    quantity: i32,
}

impl From<ItemRow> for OrderItem {
    fn from(row: ItemRow) -> Self {
        OrderItem {
            product_id: row.product_id,
            name: row.name,
            price: row.price,
            quantity: row.quantity,
        }
    }
}

#[async_trait]
impl Orders for PgOrders {
    async fn insert(&self, order: NewOrder) -> Result<Order> {
        let id = Uuid::new_v4();
        let number = order_number();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO orders \
             (id, order_number, user_id, username, email, status, total, shipping_address, payment_method, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, 'pending', $6, $7, $8, $9, $9)",
        )
        .bind(id)
        .bind(&number)
        .bind(order.user.id)
        .bind(&order.user.username)
        .bind(&order.user.email)
        .bind(order.total)
        .bind(Json(&order.shipping_address))
        .bind(&order.payment_method)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for item in &order.items {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, product_id, name, price, quantity) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(item.product_id)
            .bind(&item.name)
            .bind(item.price)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(Order {
            id,
            order_number: number,
            user: order.user,
            status: OrderStatus::Pending,
            items: order.items,
            total: order.total,
            shipping_address: order.shipping_address,
            payment_method: order.payment_method,
            created_at: now,
            updated_at: now,
        })
    }

    async fn find(&self, id: Uuid) -> Result<Option<Order>> {
        self.load(id).await
    }

    async fn set_status(&self, id: Uuid, status: OrderStatus) -> Result<Order> {
        let updated = sqlx::query("UPDATE orders SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(Error::not_found("Order"));
        }
        self.load(id).await?.ok_or_else(|| Error::not_found("Order"))
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        self.attach_items(rows).await
    }

    async fn list(
        &self,
        status: Option<OrderStatus>,
        page: u32,
        limit: u32,
    ) -> Result<OrderPage> {
        let page = page.max(1);
        let limit = i64::from(limit.max(1));
        let offset = i64::from(page - 1) * limit;

        let (rows, total) = match status {
            Some(status) => {
                let rows = sqlx::query_as::<_, OrderRow>(
                    "SELECT * FROM orders WHERE status = $1 \
                     ORDER BY created_at DESC LIMIT $2 OFFSET $3",
                )
                .bind(status)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
                let total: (i64,) =
                    sqlx::query_as("SELECT COUNT(*) FROM orders WHERE status = $1")
                        .bind(status)
                        .fetch_one(&self.pool)
                        .await?;
                (rows, total.0)
            }
            None => {
                let rows = sqlx::query_as::<_, OrderRow>(
                    "SELECT * FROM orders ORDER BY created_at DESC LIMIT $1 OFFSET $2",
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
                let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
                    .fetch_one(&self.pool)
                    .await?;
                (rows, total.0)
            }
        };

        Ok(OrderPage {
            orders: self.attach_items(rows).await?,
            total,
            total_pages: (total + limit - 1) / limit,
            current_page: page,
        })
    }

    async fn stats(&self) -> Result<OrderStats> {
        let total_orders: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        let pending_orders: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM orders WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await?;
        let total_revenue: (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(total), 0) FROM orders WHERE status <> 'cancelled'",
        )
        .fetch_one(&self.pool)
        .await?;
        let recent = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders ORDER BY created_at DESC LIMIT 5",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(OrderStats {
            total_orders: total_orders.0,
            pending_orders: pending_orders.0,
            total_revenue: total_revenue.0,
            recent_orders: self.attach_items(recent).await?,
        })
    }

    async fn delete_stale_cancelled(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let deleted = sqlx::query(
            "DELETE FROM orders WHERE status = 'cancelled' AND updated_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(deleted.rows_affected())
    }
}
