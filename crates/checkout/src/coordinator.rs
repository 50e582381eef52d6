//! Checkout coordinator for turning a cart into an order.

use std::time::Instant;

use domain::{CartItem, Order, ProductId, UserId};
use store::{CartStore, CartStoreExt, OrderStore, ProductCatalog, StoreError};

use crate::error::{Result, ServiceError};

/// Orchestrates the checkout of a user's cart.
///
/// The coordinator validates the cart against the catalog before any write,
/// then hands the order to the order store, which inserts it and removes the
/// transferred cart items in a single transaction.
#[derive(Debug, Clone)]
pub struct CheckoutCoordinator<C, O, P>
where
    C: CartStore,
    O: OrderStore,
    P: ProductCatalog,
{
    carts: C,
    orders: O,
    catalog: P,
}

impl<C, O, P> CheckoutCoordinator<C, O, P>
where
    C: CartStore,
    O: OrderStore,
    P: ProductCatalog,
{
    /// Creates a new checkout coordinator.
    pub fn new(carts: C, orders: O, catalog: P) -> Self {
        Self {
            carts,
            orders,
            catalog,
        }
    }

    /// Checks out the user's cart into a pending order.
    ///
    /// Fails with `BadRequest` when the cart is empty or when any item asks
    /// for more than the current stock; the message then names every such
    /// product. Business-rule failures happen before any write, and a failed
    /// transfer leaves the cart exactly as it was.
    #[tracing::instrument(skip(self))]
    pub async fn checkout(&self, user_id: UserId) -> Result<Order> {
        let started = Instant::now();

        // 1. Load the cart; a user without one has nothing to check out
        let cart = match self.carts.resolve_with_items(user_id).await {
            Ok(cart) => cart,
            Err(StoreError::NotFound { .. }) => return Err(reject("empty_cart", empty_cart())),
            Err(e) => return Err(e.into()),
        };

        if cart.is_empty() {
            return Err(reject("empty_cart", empty_cart()));
        }

        // 2. Re-validate stock for every item, collecting all failures
        let insufficient = self.insufficient_products(cart.items()).await?;
        if !insufficient.is_empty() {
            let names: Vec<String> = insufficient.iter().map(ToString::to_string).collect();
            return Err(reject(
                "insufficient_stock",
                ServiceError::BadRequest(format!(
                    "insufficient stock for products: {}",
                    names.join(", ")
                )),
            ));
        }

        // 3. Build the order from the validated items
        let order = Order::build_from_cart(cart.items(), user_id)
            .map_err(|e| reject("cost_overflow", e.into()))?;

        // 4. Commit the order and remove the transferred cart items
        if let Err(e) = self.orders.create_and_transfer(&order, cart.id()).await {
            metrics::counter!("checkouts_failed_total").increment(1);
            tracing::warn!(order_id = %order.id(), error = %e, "order transfer failed");
            return Err(e.into());
        }

        metrics::counter!("checkouts_total").increment(1);
        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        tracing::info!(
            order_id = %order.id(),
            items = order.item_count(),
            total_cents = order.total_cost().cents(),
            "checkout completed"
        );

        Ok(order)
    }

    /// Returns the products whose current stock is below the cart quantity.
    ///
    /// A product that is no longer in the catalog has no stock at all.
    async fn insufficient_products(&self, items: &[CartItem]) -> Result<Vec<ProductId>> {
        let mut insufficient = Vec::new();
        for item in items {
            let stock = match self.catalog.price_and_stock(item.product_id()).await {
                Ok((_, stock)) => stock,
                Err(StoreError::NotFound { .. }) => 0,
                Err(e) => return Err(e.into()),
            };

            if stock < item.quantity() {
                tracing::debug!(
                    product_id = %item.product_id(),
                    requested = item.quantity(),
                    available = stock,
                    "insufficient stock"
                );
                insufficient.push(item.product_id());
            }
        }
        Ok(insufficient)
    }
}

fn empty_cart() -> ServiceError {
    ServiceError::BadRequest("cart is empty".to_string())
}

fn reject(reason: &'static str, err: ServiceError) -> ServiceError {
    metrics::counter!("checkouts_rejected_total", "reason" => reason).increment(1);
    tracing::info!(reason, "checkout rejected");
    err
}
