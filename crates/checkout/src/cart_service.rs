//! Cart mutations and reads.

use domain::{Cart, CartItem, ProductId, UserId};
use store::{CartStore, CartStoreExt, ItemAddition, ProductCatalog, StoreError};

use crate::error::{Result, ServiceError};

/// Adds products to carts and reads them back.
///
/// Price and stock come from the catalog on every addition; the store then
/// merges the quantity atomically and re-checks it against that stock.
#[derive(Debug, Clone)]
pub struct CartService<C, P>
where
    C: CartStore,
    P: ProductCatalog,
{
    carts: C,
    catalog: P,
}

impl<C, P> CartService<C, P>
where
    C: CartStore,
    P: ProductCatalog,
{
    /// Creates a new cart service.
    pub fn new(carts: C, catalog: P) -> Self {
        Self { carts, catalog }
    }

    /// Adds `quantity` of a product to the user's cart.
    ///
    /// Creates the cart on first use and merges into an existing line for
    /// the same product. Fails with `Validation` for a zero quantity,
    /// `NotFound` for an unknown product and `BadRequest` when the merged
    /// quantity exceeds the available stock.
    #[tracing::instrument(skip(self))]
    pub async fn add_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartItem> {
        if quantity < 1 {
            return Err(ServiceError::Validation(
                "quantity must be at least 1".to_string(),
            ));
        }

        let (unit_price, stock) = self.catalog.price_and_stock(product_id).await?;

        let item = self
            .carts
            .add_or_update_item(
                user_id,
                ItemAddition {
                    product_id,
                    quantity,
                    unit_price,
                    stock,
                },
            )
            .await?;

        metrics::counter!("cart_items_added_total").increment(1);
        tracing::info!(
            cart_id = %item.cart_id(),
            quantity = item.quantity(),
            "product added to cart"
        );
        Ok(item)
    }

    /// Returns the user's active cart with its items.
    ///
    /// Each item carries the catalog's current stock as a read-only
    /// snapshot; items whose product has left the catalog carry none.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<Cart> {
        let cart = self.carts.resolve_with_items(user_id).await?;

        let mut items = Vec::with_capacity(cart.item_count());
        for item in cart.items() {
            let item = match self.catalog.price_and_stock(item.product_id()).await {
                Ok((_, stock)) => item.clone().with_stock(stock),
                Err(StoreError::NotFound { .. }) => item.clone(),
                Err(e) => return Err(e.into()),
            };
            items.push(item);
        }

        Ok(Cart::restore(cart.id(), cart.user_id(), cart.audit().clone()).with_items(items))
    }
}
