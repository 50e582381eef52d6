//! Product registration and lookup.

use domain::{Money, Product, ProductId, UserId};
use store::ProductCatalog;

use crate::error::Result;

/// Thin service over the product catalog.
#[derive(Debug, Clone)]
pub struct ProductService<P: ProductCatalog> {
    catalog: P,
}

impl<P: ProductCatalog> ProductService<P> {
    pub fn new(catalog: P) -> Self {
        Self { catalog }
    }

    /// Registers a validated product.
    #[tracing::instrument(skip(self))]
    pub async fn create_product(
        &self,
        user_id: UserId,
        name: String,
        price: Money,
        stock: u32,
    ) -> Result<Product> {
        let product = Product::new(name, price, stock, user_id)?;
        self.catalog.create_product(product.clone()).await?;
        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, product_id: ProductId) -> Result<Product> {
        Ok(self.catalog.resolve_product(product_id).await?)
    }

    /// Current unit price and available stock.
    pub async fn get_price_and_stock(&self, product_id: ProductId) -> Result<(Money, u32)> {
        Ok(self.catalog.price_and_stock(product_id).await?)
    }
}
