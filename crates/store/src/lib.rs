//! Persistence for carts, orders and catalog products.
//!
//! Two backends implement the same traits: [`InMemoryStore`] for tests and
//! local runs, and [`PostgresStore`] for production.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{CartStore, CartStoreExt, ItemAddition, OrderStore, ProductCatalog};
