//! Shared application state.

use checkout::{CartService, CheckoutCoordinator, OrderService, ProductService};
use store::{CartStore, OrderStore, ProductCatalog};

/// A backend that can serve every route: carts, orders and the catalog.
pub trait AppStore: CartStore + OrderStore + ProductCatalog + Clone + 'static {}

impl<T> AppStore for T where T: CartStore + OrderStore + ProductCatalog + Clone + 'static {}

/// Shared application state accessible from all handlers.
pub struct AppState<S: AppStore> {
    pub carts: CartService<S, S>,
    pub checkout: CheckoutCoordinator<S, S, S>,
    pub orders: OrderService<S>,
    pub products: ProductService<S>,
}

impl<S: AppStore> AppState<S> {
    /// Builds every service on top of the same store.
    pub fn new(store: S) -> Self {
        Self {
            carts: CartService::new(store.clone(), store.clone()),
            checkout: CheckoutCoordinator::new(store.clone(), store.clone(), store.clone()),
            orders: OrderService::new(store.clone()),
            products: ProductService::new(store),
        }
    }
}
