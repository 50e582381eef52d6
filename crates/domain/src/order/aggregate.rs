//! Order aggregate implementation.

use common::{Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::audit::Audit;
use crate::cart::CartItem;

use super::{OrderError, OrderItem, OrderStatus};

/// Order aggregate root.
///
/// The total is derived from the items every time they change and is never
/// taken from input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    total_cost: Money,
    status: OrderStatus,
    #[serde(flatten)]
    audit: Audit,
    items: Vec<OrderItem>,
}

impl Order {
    /// Builds a pending order with one order item per cart item.
    pub fn build_from_cart(cart_items: &[CartItem], user_id: UserId) -> Result<Self, OrderError> {
        if cart_items.is_empty() {
            return Err(OrderError::NoItems);
        }

        let id = OrderId::new();
        let items = cart_items
            .iter()
            .map(|cart_item| OrderItem::from_cart_item(id, cart_item, user_id))
            .collect::<Result<Vec<_>, _>>()?;

        let mut order = Self {
            id,
            user_id,
            total_cost: Money::zero(),
            status: OrderStatus::Pending,
            audit: Audit::created_by(user_id),
            items,
        };
        order.recalculate()?;
        Ok(order)
    }

    /// Rebuilds an order from persisted rows.
    ///
    /// Items belonging to other orders are dropped and the total is recomputed.
    pub fn restore(
        id: OrderId,
        user_id: UserId,
        status: OrderStatus,
        audit: Audit,
        items: impl IntoIterator<Item = OrderItem>,
    ) -> Result<Self, OrderError> {
        let mut order = Self {
            id,
            user_id,
            total_cost: Money::zero(),
            status,
            audit,
            items: items
                .into_iter()
                .filter(|item| item.order_id() == id)
                .collect(),
        };
        order.recalculate()?;
        Ok(order)
    }

    /// Recomputes every item cost and the order total.
    pub fn recalculate(&mut self) -> Result<(), OrderError> {
        for item in &mut self.items {
            item.recalculate()?;
        }
        self.total_cost = Money::checked_sum(self.items.iter().map(OrderItem::cost))
            .ok_or(OrderError::CostOverflow)?;
        Ok(())
    }

    /// Moves the order to `new_status` if the transition table allows it.
    pub fn update_status(&mut self, new_status: OrderStatus, actor: UserId) -> Result<(), OrderError> {
        if !self.status.can_transition_to(new_status) {
            return Err(OrderError::InvalidStatusTransition {
                from: self.status,
                to: new_status,
            });
        }

        self.status = new_status;
        self.audit.touch(actor);
        Ok(())
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn total_cost(&self) -> Money {
        self.total_cost
    }

    pub fn audit(&self) -> &Audit {
        &self.audit
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Product ids covered by this order, in item order.
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.items.iter().map(OrderItem::product_id).collect()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the order is in a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
