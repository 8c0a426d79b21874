//! Order lifecycle engine behavior over the in-memory stores.

use chrono::{Duration, Utc};
use uuid::Uuid;

use storefront::error::Error;
use storefront::models::{CartLine, Product, ShippingAddress};
use storefront::orders::memory::{MemoryCarts, MemoryCatalog, MemoryOrders};
use storefront::orders::store::Orders;
use storefront::orders::{OrderEngine, OrderStatus, OrderUser};

type TestEngine = OrderEngine<MemoryCatalog, MemoryCarts, MemoryOrders>;

struct Fixture {
    engine: TestEngine,
    catalog: MemoryCatalog,
    carts: MemoryCarts,
    orders: MemoryOrders,
}

fn fixture() -> Fixture {
    let catalog = MemoryCatalog::new();
    let carts = MemoryCarts::new();
    let orders = MemoryOrders::new();
    Fixture {
        engine: OrderEngine::new(catalog.clone(), carts.clone(), orders.clone(), 7),
        catalog,
        carts,
        orders,
    }
}

fn product(name: &str, price: i64, stock: i32) -> Product {
    let now = Utc::now();
    Product {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: format!("{name} description"),
        price,
        image: "https://img.example/p.png".to_string(),
        category: "general".to_string(),
        stock,
        featured: false,
        created_at: now,
        updated_at: now,
    }
}

fn buyer(name: &str) -> OrderUser {
    OrderUser {
        id: Uuid::new_v4(),
        username: name.to_string(),
        email: format!("{name}@example.com"),
    }
}

fn address() -> ShippingAddress {
    ShippingAddress {
        full_name: "Ada Lovelace".to_string(),
        street: "12 Analytical Way".to_string(),
        city: "London".to_string(),
        postal_code: "N1 9GU".to_string(),
        country: "UK".to_string(),
        phone: None,
    }
}

async fn fill_cart(fx: &Fixture, user: &OrderUser, lines: &[(&Product, i32)]) {
    fx.carts
        .set_cart(
            user.id,
            lines
                .iter()
                .map(|(p, q)| CartLine {
                    product_id: p.id,
                    quantity: *q,
                })
                .collect(),
        )
        .await;
}

#[tokio::test]
async fn create_order_decrements_stock_and_clears_cart() {
    let fx = fixture();
    let a = product("productA", 1000, 5);
    let b = product("productB", 500, 1);
    fx.catalog.add_product(a.clone()).await;
    fx.catalog.add_product(b.clone()).await;
    let user = buyer("ada");
    fill_cart(&fx, &user, &[(&a, 2), (&b, 1)]).await;

    let order = fx
        .engine
        .create_order(user.clone(), address(), None)
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total, 2500);
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.payment_method, "cash_on_delivery");
    assert_eq!(fx.catalog.stock_of(a.id).await, Some(3));
    assert_eq!(fx.catalog.stock_of(b.id).await, Some(0));
    assert!(fx.carts.is_empty(user.id).await);
}

#[tokio::test]
async fn create_order_insufficient_stock_changes_nothing() {
    let fx = fixture();
    let a = product("productA", 1000, 5);
    let b = product("productB", 500, 0);
    fx.catalog.add_product(a.clone()).await;
    fx.catalog.add_product(b.clone()).await;
    let user = buyer("ada");
    fill_cart(&fx, &user, &[(&a, 2), (&b, 1)]).await;

    let err = fx
        .engine
        .create_order(user.clone(), address(), None)
        .await
        .unwrap_err();

    match err {
        Error::InsufficientStock {
            name,
            available,
            requested,
        } => {
            assert_eq!(name, "productB");
            assert_eq!(available, 0);
            assert_eq!(requested, 1);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
    assert_eq!(fx.catalog.stock_of(a.id).await, Some(5));
    assert_eq!(fx.catalog.stock_of(b.id).await, Some(0));
    assert!(!fx.carts.is_empty(user.id).await);
    assert_eq!(fx.orders.count().await, 0);
}

#[tokio::test]
async fn create_order_requires_non_empty_cart() {
    let fx = fixture();
    let user = buyer("ada");
    let err = fx
        .engine
        .create_order(user, address(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(msg) if msg == "Cart is empty"));
}

#[tokio::test]
async fn create_order_fails_when_a_product_vanished() {
    let fx = fixture();
    let ghost = product("ghost", 100, 10);
    let user = buyer("ada");
    // Cart references a product that was never added to the catalog.
    fill_cart(&fx, &user, &[(&ghost, 1)]).await;
    let err = fx
        .engine
        .create_order(user, address(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(fx.orders.count().await, 0);
}

#[tokio::test]
async fn order_total_is_immune_to_later_price_changes() {
    let fx = fixture();
    let a = product("productA", 1000, 5);
    fx.catalog.add_product(a.clone()).await;
    let user = buyer("ada");
    fill_cart(&fx, &user, &[(&a, 3)]).await;

    let order = fx
        .engine
        .create_order(user.clone(), address(), None)
        .await
        .unwrap();
    assert_eq!(order.total, 3000);

    fx.catalog.set_price(a.id, 9999).await;
    let reloaded = fx.engine.get_order(order.id, user.id, false).await.unwrap();
    assert_eq!(reloaded.total, 3000);
    assert_eq!(reloaded.items[0].price, 1000);
}

#[tokio::test]
async fn owner_cancel_restores_stock_for_pending_orders_only() {
    let fx = fixture();
    let a = product("productA", 1000, 5);
    fx.catalog.add_product(a.clone()).await;
    let user = buyer("ada");
    fill_cart(&fx, &user, &[(&a, 2)]).await;
    let order = fx
        .engine
        .create_order(user.clone(), address(), None)
        .await
        .unwrap();
    assert_eq!(fx.catalog.stock_of(a.id).await, Some(3));

    let cancelled = fx.engine.owner_cancel(order.id, user.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(fx.catalog.stock_of(a.id).await, Some(5));
}

#[tokio::test]
async fn owner_cancel_rejected_after_pending() {
    let fx = fixture();
    let a = product("productA", 1000, 5);
    fx.catalog.add_product(a.clone()).await;
    let user = buyer("ada");
    fill_cart(&fx, &user, &[(&a, 1)]).await;
    let order = fx
        .engine
        .create_order(user.clone(), address(), None)
        .await
        .unwrap();
    fx.engine
        .update_status(order.id, OrderStatus::Processing)
        .await
        .unwrap();

    let err = fx.engine.owner_cancel(order.id, user.id).await.unwrap_err();
    assert!(matches!(err, Error::Validation(msg) if msg == "Order cannot be cancelled at this stage"));
    assert_eq!(fx.catalog.stock_of(a.id).await, Some(4));
}

#[tokio::test]
async fn owner_cancel_requires_ownership() {
    let fx = fixture();
    let a = product("productA", 1000, 5);
    fx.catalog.add_product(a.clone()).await;
    let user = buyer("ada");
    fill_cart(&fx, &user, &[(&a, 1)]).await;
    let order = fx
        .engine
        .create_order(user, address(), None)
        .await
        .unwrap();

    let stranger = Uuid::new_v4();
    let err = fx.engine.owner_cancel(order.id, stranger).await.unwrap_err();
    assert!(matches!(err, Error::Forbidden));
}

#[tokio::test]
async fn admin_cancel_restores_stock_except_delivered_or_cancelled() {
    let fx = fixture();
    let a = product("productA", 1000, 5);
    fx.catalog.add_product(a.clone()).await;
    let user = buyer("ada");
    fill_cart(&fx, &user, &[(&a, 2)]).await;
    let order = fx
        .engine
        .create_order(user.clone(), address(), None)
        .await
        .unwrap();
    fx.engine
        .update_status(order.id, OrderStatus::Processing)
        .await
        .unwrap();

    let cancelled = fx.engine.admin_cancel(order.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(fx.catalog.stock_of(a.id).await, Some(5));

    let err = fx.engine.admin_cancel(order.id).await.unwrap_err();
    assert!(matches!(err, Error::TerminalState(msg) if msg == "Order is already cancelled"));

    // A delivered order cannot be cancelled even by an admin.
    fill_cart(&fx, &user, &[(&a, 1)]).await;
    let delivered = fx
        .engine
        .create_order(user, address(), None)
        .await
        .unwrap();
    fx.engine
        .update_status(delivered.id, OrderStatus::Delivered)
        .await
        .unwrap();
    let err = fx.engine.admin_cancel(delivered.id).await.unwrap_err();
    assert!(matches!(err, Error::Validation(msg) if msg == "Cannot cancel a delivered order"));
}

#[tokio::test]
async fn cancelled_to_cancelled_is_terminal() {
    let fx = fixture();
    let a = product("productA", 1000, 5);
    fx.catalog.add_product(a.clone()).await;
    let user = buyer("ada");
    fill_cart(&fx, &user, &[(&a, 2)]).await;
    let order = fx
        .engine
        .create_order(user, address(), None)
        .await
        .unwrap();
    fx.engine.admin_cancel(order.id).await.unwrap();

    let err = fx
        .engine
        .update_status(order.id, OrderStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TerminalState(_)));
    assert_eq!(fx.catalog.stock_of(a.id).await, Some(5));
    let order = fx.orders.find(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn reactivation_re_deducts_stock() {
    let fx = fixture();
    let a = product("productA", 1000, 5);
    fx.catalog.add_product(a.clone()).await;
    let user = buyer("ada");
    fill_cart(&fx, &user, &[(&a, 2)]).await;
    let order = fx
        .engine
        .create_order(user, address(), None)
        .await
        .unwrap();
    fx.engine.admin_cancel(order.id).await.unwrap();
    assert_eq!(fx.catalog.stock_of(a.id).await, Some(5));

    let reactivated = fx
        .engine
        .update_status(order.id, OrderStatus::Processing)
        .await
        .unwrap();
    assert_eq!(reactivated.status, OrderStatus::Processing);
    assert_eq!(fx.catalog.stock_of(a.id).await, Some(3));
}

#[tokio::test]
async fn reactivation_fails_whole_when_any_line_is_short() {
    let fx = fixture();
    let mut a = product("productA", 1000, 5);
    fx.catalog.add_product(a.clone()).await;
    let user = buyer("ada");
    fill_cart(&fx, &user, &[(&a, 2)]).await;
    let order = fx
        .engine
        .create_order(user, address(), None)
        .await
        .unwrap();
    fx.engine.admin_cancel(order.id).await.unwrap();

    // The stock was sold elsewhere while the order sat cancelled.
    a.stock = 1;
    fx.catalog.add_product(a.clone()).await;

    let err = fx
        .engine
        .update_status(order.id, OrderStatus::Processing)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InsufficientStock { .. }));
    assert_eq!(fx.catalog.stock_of(a.id).await, Some(1));
    let order = fx.orders.find(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn active_status_changes_have_no_stock_effect() {
    let fx = fixture();
    let a = product("productA", 1000, 5);
    fx.catalog.add_product(a.clone()).await;
    let user = buyer("ada");
    fill_cart(&fx, &user, &[(&a, 2)]).await;
    let order = fx
        .engine
        .create_order(user, address(), None)
        .await
        .unwrap();

    for status in [
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ] {
        let updated = fx.engine.update_status(order.id, status).await.unwrap();
        assert_eq!(updated.status, status);
        assert_eq!(fx.catalog.stock_of(a.id).await, Some(3));
    }
}

#[tokio::test]
async fn get_order_enforces_owner_or_admin() {
    let fx = fixture();
    let a = product("productA", 1000, 5);
    fx.catalog.add_product(a.clone()).await;
    let user = buyer("ada");
    fill_cart(&fx, &user, &[(&a, 1)]).await;
    let order = fx
        .engine
        .create_order(user.clone(), address(), None)
        .await
        .unwrap();

    assert!(fx.engine.get_order(order.id, user.id, false).await.is_ok());
    assert!(fx
        .engine
        .get_order(order.id, Uuid::new_v4(), true)
        .await
        .is_ok());
    let err = fx
        .engine
        .get_order(order.id, Uuid::new_v4(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden));
}

#[tokio::test]
async fn retention_sweep_deletes_only_stale_cancelled_orders() {
    let fx = fixture();
    let a = product("productA", 1000, 50);
    fx.catalog.add_product(a.clone()).await;
    let user = buyer("ada");

    let mut ids = Vec::new();
    for _ in 0..3 {
        fill_cart(&fx, &user, &[(&a, 1)]).await;
        let order = fx
            .engine
            .create_order(user.clone(), address(), None)
            .await
            .unwrap();
        ids.push(order.id);
    }
    // One stale cancelled, one fresh cancelled, one stale but still pending.
    fx.engine.admin_cancel(ids[0]).await.unwrap();
    fx.orders
        .backdate(ids[0], Utc::now() - Duration::days(8))
        .await;
    fx.engine.admin_cancel(ids[1]).await.unwrap();
    fx.orders
        .backdate(ids[2], Utc::now() - Duration::days(30))
        .await;

    let deleted = fx.engine.run_retention_sweep().await.unwrap();
    assert_eq!(deleted, 1);
    assert!(!fx.orders.contains(ids[0]).await);
    assert!(fx.orders.contains(ids[1]).await);
    assert!(fx.orders.contains(ids[2]).await);

    // Idempotent: nothing left to delete.
    assert_eq!(fx.engine.run_retention_sweep().await.unwrap(), 0);
}

#[tokio::test]
async fn stats_exclude_cancelled_revenue() {
    let fx = fixture();
    let a = product("productA", 1000, 50);
    fx.catalog.add_product(a.clone()).await;
    let user = buyer("ada");

    let mut ids = Vec::new();
    for qty in [1, 2, 3] {
        fill_cart(&fx, &user, &[(&a, qty)]).await;
        let order = fx
            .engine
            .create_order(user.clone(), address(), None)
            .await
            .unwrap();
        ids.push(order.id);
    }
    fx.engine.admin_cancel(ids[2]).await.unwrap();
    fx.engine
        .update_status(ids[1], OrderStatus::Shipped)
        .await
        .unwrap();

    let stats = fx.engine.stats().await.unwrap();
    assert_eq!(stats.total_orders, 3);
    assert_eq!(stats.pending_orders, 1);
    assert_eq!(stats.total_revenue, 1000 + 2000);
    assert_eq!(stats.recent_orders.len(), 3);
}

#[tokio::test]
async fn admin_listing_filters_by_status_and_paginates() {
    let fx = fixture();
    let a = product("productA", 1000, 50);
    fx.catalog.add_product(a.clone()).await;
    let user = buyer("ada");

    for _ in 0..4 {
        fill_cart(&fx, &user, &[(&a, 1)]).await;
        fx.engine
            .create_order(user.clone(), address(), None)
            .await
            .unwrap();
    }

    let page = fx
        .engine
        .list_orders(Some(OrderStatus::Pending), 1, 3)
        .await
        .unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.orders.len(), 3);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.current_page, 1);

    let empty = fx
        .engine
        .list_orders(Some(OrderStatus::Shipped), 1, 10)
        .await
        .unwrap();
    assert_eq!(empty.total, 0);
    assert!(empty.orders.is_empty());
}
