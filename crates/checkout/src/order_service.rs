//! Order reads and status changes.

use domain::{Order, OrderId, OrderStatus, UserId};
use store::OrderStore;

use crate::error::{Result, ServiceError};

/// Reads a user's orders and moves them through the status state machine.
#[derive(Debug, Clone)]
pub struct OrderService<O: OrderStore> {
    orders: O,
}

impl<O: OrderStore> OrderService<O> {
    /// Creates a new order service.
    pub fn new(orders: O) -> Self {
        Self { orders }
    }

    /// Loads one of the user's orders.
    ///
    /// Another user's order is reported as not found.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, user_id: UserId, order_id: OrderId) -> Result<Order> {
        let order = self.orders.resolve_by_id(order_id).await?;
        if order.user_id() != user_id {
            return Err(ServiceError::NotFound(format!("order not found: {order_id}")));
        }
        Ok(order)
    }

    /// Lists the user's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>> {
        Ok(self.orders.resolve_orders_by_user_id(user_id).await?)
    }

    /// Moves one of the user's orders to `new_status`.
    ///
    /// Fails with `Conflict` when the transition table forbids the move or
    /// when another writer changed the status first.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        user_id: UserId,
        order_id: OrderId,
        new_status: OrderStatus,
    ) -> Result<Order> {
        let mut order = self.get_order(user_id, order_id).await?;
        let previous = order.status();

        order.update_status(new_status, user_id)?;
        self.orders.update_status(&order, previous).await?;

        metrics::counter!(
            "order_status_updates_total",
            "from" => previous.as_str(),
            "to" => new_status.as_str()
        )
        .increment(1);
        tracing::info!(%order_id, from = %previous, to = %new_status, "order status updated");

        Ok(order)
    }
}
