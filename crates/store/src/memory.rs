use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{CartId, Money, OrderId, ProductId, UserId};
use domain::{Cart, CartItem, Order, OrderStatus, Product};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    store::{CartStore, ItemAddition, OrderStore, ProductCatalog, verify_transfer},
};

#[derive(Debug, Default)]
struct InMemoryState {
    /// Cart headers, soft-deleted ones included.
    carts: Vec<Cart>,
    cart_items: Vec<CartItem>,
    /// Orders in insertion order.
    orders: Vec<Order>,
    products: HashMap<ProductId, Product>,
    fail_on_transfer: bool,
}

impl InMemoryState {
    fn active_cart(&self, user_id: UserId) -> Option<&Cart> {
        self.carts
            .iter()
            .find(|cart| cart.user_id() == user_id && !cart.is_deleted())
    }
}

/// In-memory store implementation for testing and local runs.
///
/// One lock guards carts, orders and products together, so every trait
/// method is atomic with respect to every other.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to fail the next order transfers.
    pub async fn set_fail_on_transfer(&self, fail: bool) {
        self.state.write().await.fail_on_transfer = fail;
    }

    /// Overwrites the stock of a product.
    pub async fn set_stock(&self, product_id: ProductId, stock: u32) -> Result<()> {
        let mut state = self.state.write().await;
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or_else(|| StoreError::not_found("product", product_id))?;
        product.stock = stock;
        Ok(())
    }

    /// Soft-deletes the user's active cart.
    pub async fn soft_delete_cart(&self, user_id: UserId) -> Result<()> {
        let mut state = self.state.write().await;
        let cart = state
            .carts
            .iter_mut()
            .find(|cart| cart.user_id() == user_id && !cart.is_deleted())
            .ok_or_else(|| StoreError::not_found("cart", user_id))?;
        cart.mark_deleted(user_id);
        Ok(())
    }

    /// Returns the number of cart headers stored, soft-deleted ones included.
    pub async fn cart_count(&self) -> usize {
        self.state.read().await.carts.len()
    }

    /// Returns the number of cart items stored across all carts.
    pub async fn cart_item_count(&self) -> usize {
        self.state.read().await.cart_items.len()
    }

    /// Returns the number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn resolve_by_user_id(&self, user_id: UserId) -> Result<Cart> {
        let state = self.state.read().await;
        state
            .active_cart(user_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("cart", user_id))
    }

    async fn exists_by_user_id(&self, user_id: UserId) -> Result<bool> {
        Ok(self.state.read().await.active_cart(user_id).is_some())
    }

    async fn resolve_items_by_cart_ids(&self, cart_ids: &[CartId]) -> Result<Vec<CartItem>> {
        if cart_ids.is_empty() {
            return Ok(Vec::new());
        }

        let state = self.state.read().await;
        Ok(state
            .cart_items
            .iter()
            .filter(|item| cart_ids.contains(&item.cart_id()))
            .cloned()
            .collect())
    }

    async fn create_cart(&self, cart: Cart) -> Result<()> {
        let mut state = self.state.write().await;

        if state.active_cart(cart.user_id()).is_some() {
            return Err(StoreError::Conflict(format!(
                "user {} already has an active cart",
                cart.user_id()
            )));
        }

        let items = cart.items();
        for (i, item) in items.iter().enumerate() {
            if items[..i]
                .iter()
                .any(|other| other.product_id() == item.product_id())
            {
                return Err(StoreError::Conflict(format!(
                    "product {} appears twice in cart {}",
                    item.product_id(),
                    cart.id()
                )));
            }
        }

        state.cart_items.extend(items.iter().cloned());
        state
            .carts
            .push(Cart::restore(cart.id(), cart.user_id(), cart.audit().clone()));
        Ok(())
    }

    async fn add_or_update_item(
        &self,
        user_id: UserId,
        addition: ItemAddition,
    ) -> Result<CartItem> {
        let mut state = self.state.write().await;

        // Get-or-create runs under the same lock as the item write. A new
        // cart is only stored once its first item is accepted.
        let (cart_id, new_cart) = match state.active_cart(user_id).map(Cart::id) {
            Some(id) => (id, None),
            None => {
                let cart = Cart::new(user_id);
                (cart.id(), Some(cart))
            }
        };

        let existing = state.cart_items.iter().position(|item| {
            item.cart_id() == cart_id && item.product_id() == addition.product_id
        });

        let item = match existing {
            Some(index) => {
                let merged = state.cart_items[index].merge(
                    addition.quantity,
                    addition.unit_price,
                    addition.stock,
                    user_id,
                )?;
                state.cart_items[index] = merged.clone();
                merged
            }
            None => {
                let item = CartItem::create(
                    cart_id,
                    addition.product_id,
                    addition.quantity,
                    addition.unit_price,
                    user_id,
                )?;
                item.ensure_stock(addition.stock)?;
                let item = item.with_stock(addition.stock);
                state.cart_items.push(item.clone());
                item
            }
        };

        if let Some(cart) = new_cart {
            state.carts.push(cart);
        }
        Ok(item)
    }

    async fn current_quantity(&self, cart_id: CartId, product_id: ProductId) -> Result<u32> {
        let state = self.state.read().await;
        Ok(state
            .cart_items
            .iter()
            .find(|item| item.cart_id() == cart_id && item.product_id() == product_id)
            .map(CartItem::quantity)
            .unwrap_or(0))
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn exists_by_id(&self, order_id: OrderId) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state.orders.iter().any(|order| order.id() == order_id))
    }

    async fn create_and_transfer(&self, order: &Order, cart_id: CartId) -> Result<()> {
        let mut state = self.state.write().await;

        if state.fail_on_transfer {
            return Err(StoreError::Unavailable(
                "simulated failure during order transfer".to_string(),
            ));
        }

        if state.orders.iter().any(|existing| existing.id() == order.id()) {
            return Err(StoreError::Conflict(format!(
                "order {} already exists",
                order.id()
            )));
        }

        let ordered = order.product_ids();
        let transferred = |item: &CartItem| {
            item.cart_id() == cart_id && ordered.contains(&item.product_id())
        };

        let removed: Vec<(ProductId, u32)> = state
            .cart_items
            .iter()
            .filter(|item| transferred(*item))
            .map(|item| (item.product_id(), item.quantity()))
            .collect();
        verify_transfer(order, &removed)?;

        // Every check passed; apply both halves together.
        state.cart_items.retain(|item| !transferred(item));
        state.orders.push(order.clone());
        Ok(())
    }

    async fn resolve_by_id(&self, order_id: OrderId) -> Result<Order> {
        let state = self.state.read().await;
        state
            .orders
            .iter()
            .find(|order| order.id() == order_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("order", order_id))
    }

    async fn resolve_orders_by_user_id(&self, user_id: UserId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .rev()
            .filter(|order| order.user_id() == user_id)
            .cloned()
            .collect())
    }

    async fn update_status(&self, order: &Order, previous: OrderStatus) -> Result<()> {
        let mut state = self.state.write().await;
        let stored = state
            .orders
            .iter_mut()
            .find(|stored| stored.id() == order.id())
            .ok_or_else(|| StoreError::not_found("order", order.id()))?;

        if stored.status() != previous {
            return Err(StoreError::Conflict(format!(
                "order {} is {}, expected {}",
                order.id(),
                stored.status(),
                previous
            )));
        }

        *stored = order.clone();
        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for InMemoryStore {
    async fn price_and_stock(&self, product_id: ProductId) -> Result<(Money, u32)> {
        let state = self.state.read().await;
        state
            .products
            .get(&product_id)
            .filter(|product| !product.is_deleted())
            .map(|product| (product.price, product.stock))
            .ok_or_else(|| StoreError::not_found("product", product_id))
    }

    async fn create_product(&self, product: Product) -> Result<()> {
        let mut state = self.state.write().await;
        if state.products.contains_key(&product.id) {
            return Err(StoreError::Conflict(format!(
                "product {} already exists",
                product.id
            )));
        }
        state.products.insert(product.id, product);
        Ok(())
    }

    async fn resolve_product(&self, product_id: ProductId) -> Result<Product> {
        let state = self.state.read().await;
        state
            .products
            .get(&product_id)
            .filter(|product| !product.is_deleted())
            .cloned()
            .ok_or_else(|| StoreError::not_found("product", product_id))
    }
}
