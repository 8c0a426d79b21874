//! Order lifecycle: status machine, collaborator seams, engine and the
//! storage implementations behind it.

pub mod engine;
pub mod memory;
pub mod pg;
pub mod status;
pub mod store;

pub use engine::OrderEngine;
pub use status::{plan_transition, OrderStatus, StockEffect};
pub use store::{Order, OrderItem, OrderPage, OrderStats, OrderUser};

/// The engine as wired in production.
pub type Engine = OrderEngine<pg::PgCatalog, pg::PgCarts, pg::PgOrders>;
