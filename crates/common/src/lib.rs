//! Shared types for the cart and checkout service.
//!
//! Every crate in the workspace speaks in these identifiers and in [`Money`],
//! so they live at the bottom of the dependency graph.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{CartId, OrderId, ProductId, UserId};
