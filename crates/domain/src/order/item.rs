//! Order line items.

use common::{Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::audit::Audit;
use crate::cart::CartItem;

use super::OrderError;

/// The permanent record of one purchased product.
///
/// Quantity and unit price are copied from the cart at checkout and never
/// change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    order_id: OrderId,
    product_id: ProductId,
    quantity: u32,
    unit_price: Money,
    cost: Money,
    #[serde(flatten)]
    audit: Audit,
}

impl OrderItem {
    /// Snapshots a cart item into an order item.
    pub fn from_cart_item(
        order_id: OrderId,
        cart_item: &CartItem,
        created_by: UserId,
    ) -> Result<Self, OrderError> {
        Self::restore(
            order_id,
            cart_item.product_id(),
            cart_item.quantity(),
            cart_item.unit_price(),
            Audit::created_by(created_by),
        )
    }

    /// Rebuilds an item from persisted columns, deriving the cost again.
    pub fn restore(
        order_id: OrderId,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
        audit: Audit,
    ) -> Result<Self, OrderError> {
        let mut item = Self {
            order_id,
            product_id,
            quantity,
            unit_price,
            cost: Money::zero(),
            audit,
        };
        item.recalculate()?;
        Ok(item)
    }

    /// Recomputes the cost from quantity and unit price.
    pub fn recalculate(&mut self) -> Result<(), OrderError> {
        self.cost = self
            .unit_price
            .checked_mul(self.quantity)
            .ok_or(OrderError::CostOverflow)?;
        Ok(())
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn cost(&self) -> Money {
        self.cost
    }

    pub fn audit(&self) -> &Audit {
        &self.audit
    }
}
