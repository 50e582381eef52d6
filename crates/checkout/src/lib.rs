//! Cart and checkout services.
//!
//! This crate turns the store traits into the operations exposed to the
//! HTTP layer:
//! 1. Add products to a user's cart, merging repeated additions
//! 2. Check the cart out into a pending order in one atomic transfer
//! 3. Read orders and advance them through the status state machine
//!
//! Every operation takes the acting user explicitly.

pub mod cart_service;
pub mod coordinator;
pub mod error;
pub mod order_service;
pub mod product_service;

pub use cart_service::CartService;
pub use coordinator::CheckoutCoordinator;
pub use error::{Result, ServiceError};
pub use order_service::OrderService;
pub use product_service::ProductService;
