//! Catalog products, the source of prices and stock.

use common::{Money, ProductId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audit::Audit;

/// Errors that can occur when registering a product.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    /// Product name is required.
    #[error("Product name is required")]
    NameRequired,

    /// Unit price below zero or above [`MAX_PRICE`].
    #[error("Invalid price: {price} (must be between $0.00 and $1000000000.00)")]
    InvalidPrice { price: Money },
}

/// Highest unit price the catalog accepts.
pub const MAX_PRICE: Money = Money::from_cents(100_000_000_000);

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: u32,
    #[serde(flatten)]
    pub audit: Audit,
}

impl Product {
    /// Creates a validated product.
    pub fn new(
        name: impl Into<String>,
        price: Money,
        stock: u32,
        created_by: UserId,
    ) -> Result<Self, ProductError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ProductError::NameRequired);
        }
        if price.is_negative() || price > MAX_PRICE {
            return Err(ProductError::InvalidPrice { price });
        }

        Ok(Self {
            id: ProductId::new(),
            name,
            price,
            stock,
            audit: Audit::created_by(created_by),
        })
    }

    pub fn is_deleted(&self) -> bool {
        self.audit.is_deleted()
    }
}
