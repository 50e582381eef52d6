//! Domain layer for the cart and checkout service.
//!
//! This crate provides the core aggregates:
//! - Cart aggregate with stock-aware merge and cost recalculation
//! - Order aggregate with total recalculation and the status state machine
//! - Catalog products
//!
//! Everything here is a pure in-memory transform; persistence lives in the
//! `store` crate.

pub mod audit;
pub mod cart;
pub mod order;
pub mod product;

pub use audit::Audit;
pub use cart::{Cart, CartError, CartItem};
pub use common::{CartId, Money, OrderId, ProductId, UserId};
pub use order::{Order, OrderError, OrderItem, OrderStatus};
pub use product::{Product, ProductError};
