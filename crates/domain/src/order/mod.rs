//! Order aggregate and related types.

mod aggregate;
mod item;
mod state;

pub use aggregate::Order;
pub use item::OrderItem;
pub use state::OrderStatus;

use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The status change is not in the transition table.
    #[error("Invalid status transition: cannot change from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// Status name not recognized.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),

    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// A line cost or the order total does not fit in a money amount.
    #[error("Order total exceeds the largest supported amount")]
    CostOverflow,
}
