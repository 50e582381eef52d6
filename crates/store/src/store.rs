use async_trait::async_trait;
use common::{CartId, Money, OrderId, ProductId, UserId};
use domain::{Cart, CartItem, Order, OrderItem, OrderStatus, Product};

use crate::{Result, StoreError};

/// A request to add a quantity of a product to a user's cart.
///
/// Price and stock come from the catalog and are checked against the merged
/// quantity inside the store's atomic section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemAddition {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
    pub stock: u32,
}

/// Persistence boundary for carts and cart items.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Returns the user's active cart header, without items.
    ///
    /// Fails with `NotFound` if the user has no cart or it is soft-deleted.
    async fn resolve_by_user_id(&self, user_id: UserId) -> Result<Cart>;

    /// Returns true if the user has an active cart.
    async fn exists_by_user_id(&self, user_id: UserId) -> Result<bool>;

    /// Retrieves the items of several carts at once.
    ///
    /// An empty slice returns an empty list without touching the backend.
    async fn resolve_items_by_cart_ids(&self, cart_ids: &[CartId]) -> Result<Vec<CartItem>>;

    /// Inserts a cart header and its initial items atomically.
    ///
    /// Fails with `Conflict` if the user already has an active cart.
    async fn create_cart(&self, cart: Cart) -> Result<()>;

    /// Adds a quantity of a product to the user's cart.
    ///
    /// Creates the cart if needed, then either inserts a new item or merges
    /// into the existing one. The whole read-modify-write is atomic and
    /// serialized per cart, so concurrent additions never lose updates.
    async fn add_or_update_item(&self, user_id: UserId, addition: ItemAddition)
    -> Result<CartItem>;

    /// Returns the quantity of a product in a cart, or 0 when there is no such item.
    async fn current_quantity(&self, cart_id: CartId, product_id: ProductId) -> Result<u32>;
}

/// Extension trait providing convenience methods for cart stores.
#[async_trait]
pub trait CartStoreExt: CartStore {
    /// Loads the user's active cart with its items attached.
    async fn resolve_with_items(&self, user_id: UserId) -> Result<Cart> {
        let mut cart = self.resolve_by_user_id(user_id).await?;
        let items = self.resolve_items_by_cart_ids(&[cart.id()]).await?;
        cart.attach_items(items);
        Ok(cart)
    }
}

// Blanket implementation for all CartStore implementations
impl<T: CartStore + ?Sized> CartStoreExt for T {}

/// Persistence boundary for orders and order items.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Returns true if an order with this id exists.
    async fn exists_by_id(&self, order_id: OrderId) -> Result<bool>;

    /// Commits an order and removes the transferred cart items, atomically.
    ///
    /// Inserts the header and every item, then deletes exactly the cart items
    /// whose products are in the order. Each deleted item must still hold the
    /// ordered quantity; otherwise the cart changed since it was read and the
    /// whole transfer fails with `Conflict`. Any failure leaves both the cart
    /// and the order tables untouched.
    async fn create_and_transfer(&self, order: &Order, cart_id: CartId) -> Result<()>;

    /// Loads an order with its items.
    async fn resolve_by_id(&self, order_id: OrderId) -> Result<Order>;

    /// Loads all orders of a user, newest first.
    async fn resolve_orders_by_user_id(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Persists a status change made on the aggregate.
    ///
    /// Compare-and-set: fails with `Conflict` if the stored status is no
    /// longer `previous`.
    async fn update_status(&self, order: &Order, previous: OrderStatus) -> Result<()>;
}

/// The product price and stock oracle, plus product registration.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Returns the current unit price and available stock of a product.
    async fn price_and_stock(&self, product_id: ProductId) -> Result<(Money, u32)>;

    /// Registers a new product.
    async fn create_product(&self, product: Product) -> Result<()>;

    /// Loads a product.
    async fn resolve_product(&self, product_id: ProductId) -> Result<Product>;
}

/// Checks that a batch of deleted cart rows matches the order exactly.
pub(crate) fn verify_transfer(order: &Order, removed: &[(ProductId, u32)]) -> Result<()> {
    let matches = |item: &OrderItem| {
        removed
            .iter()
            .any(|(product_id, quantity)| {
                *product_id == item.product_id() && *quantity == item.quantity()
            })
    };

    if removed.len() != order.item_count() || !order.items().iter().all(matches) {
        return Err(StoreError::Conflict(format!(
            "cart changed while order {} was being placed",
            order.id()
        )));
    }
    Ok(())
}
