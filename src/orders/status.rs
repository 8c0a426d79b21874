//! Order status machine.
//!
//! Transitions and their stock side effects are a single explicit table
//! rather than scattered conditionals:
//!
//! ```text
//! pending ──► processing ──► shipped ──► delivered
//!    │             │             │
//!    └─────────────┴─────────────┴──► cancelled ──(re-check stock)──► any
//! ```
//!
//! `cancelled` restores every line's stock; leaving `cancelled` re-validates
//! and re-deducts stock atomically. A cancelled order can never be cancelled
//! again.

use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Parses a client-supplied status value.
    pub fn parse(value: &str) -> Result<Self, Error> {
        match value {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            _ => Err(Error::Validation("Invalid status".to_string())),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stock side effect of a status transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StockEffect {
    /// No stock movement.
    None,
    /// Return every line's quantity to its product.
    Restore,
    /// Re-validate availability and deduct every line again (reactivation).
    RevalidateAndDeduct,
}

/// Resolves the stock effect of moving `from` → `to`, or rejects the
/// transition outright.
pub fn plan_transition(from: OrderStatus, to: OrderStatus) -> Result<StockEffect, Error> {
    use OrderStatus::Cancelled;
    match (from, to) {
        (Cancelled, Cancelled) => Err(Error::TerminalState(
            "Cannot update status of a cancelled order".to_string(),
        )),
        (Cancelled, _) => Ok(StockEffect::RevalidateAndDeduct),
        (_, Cancelled) => Ok(StockEffect::Restore),
        _ => Ok(StockEffect::None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(OrderStatus::parse("refunded").is_err());
        assert!(OrderStatus::parse("").is_err());
    }

    #[test]
    fn test_transition_table_exhaustive() {
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                let planned = plan_transition(from, to);
                match (from, to) {
                    (OrderStatus::Cancelled, OrderStatus::Cancelled) => {
                        assert!(matches!(planned, Err(Error::TerminalState(_))));
                    }
                    (OrderStatus::Cancelled, _) => {
                        assert_eq!(planned.unwrap(), StockEffect::RevalidateAndDeduct);
                    }
                    (_, OrderStatus::Cancelled) => {
                        assert_eq!(planned.unwrap(), StockEffect::Restore);
                    }
                    _ => assert_eq!(planned.unwrap(), StockEffect::None),
                }
            }
        }
    }

    #[test]
    fn test_self_transition_of_active_status_is_a_noop() {
        assert_eq!(
            plan_transition(OrderStatus::Shipped, OrderStatus::Shipped).unwrap(),
            StockEffect::None
        );
    }
}
