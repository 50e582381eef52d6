//! Cart aggregate and related types.

mod aggregate;
mod item;

pub use aggregate::Cart;
pub use item::CartItem;

use common::{Money, ProductId};
use thiserror::Error;

/// Errors that can occur during cart operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// Quantity below the minimum of one.
    #[error("Invalid quantity: {quantity} (must be at least 1)")]
    InvalidQuantity { quantity: u32 },

    /// Negative unit price.
    #[error("Invalid price: {price} (must not be negative)")]
    InvalidPrice { price: Money },

    /// The resulting quantity would exceed the available stock.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u64,
        available: u32,
    },

    /// `quantity * unit_price` does not fit in a money amount.
    #[error("Cost of {quantity} x {unit_price} exceeds the largest supported amount")]
    CostOverflow { quantity: u32, unit_price: Money },

    /// The sum of the line costs does not fit in a money amount.
    #[error("Cart total exceeds the largest supported amount")]
    TotalOverflow,
}
