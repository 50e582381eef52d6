//! Service error taxonomy.

use domain::{CartError, OrderError, ProductError};
use store::StoreError;
use thiserror::Error;

/// Errors returned by the cart, checkout and order services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed or out-of-range input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A cart, order or product does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate creation, illegal status transition or a lost race.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A business rule rejected the request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The backend failed; the detail is not meant for clients.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ServiceError::NotFound(err.to_string()),
            StoreError::Conflict(msg) => ServiceError::Conflict(msg),
            StoreError::Cart(cart_err) => cart_err.into(),
            StoreError::InvalidData(_)
            | StoreError::Unavailable(_)
            | StoreError::Database(_)
            | StoreError::Migration(_) => ServiceError::Internal(err.to_string()),
        }
    }
}

impl From<CartError> for ServiceError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::InsufficientStock { .. } => ServiceError::BadRequest(err.to_string()),
            CartError::InvalidQuantity { .. }
            | CartError::InvalidPrice { .. }
            | CartError::CostOverflow { .. }
            | CartError::TotalOverflow => ServiceError::Validation(err.to_string()),
        }
    }
}

impl From<OrderError> for ServiceError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidStatusTransition { .. } => ServiceError::Conflict(err.to_string()),
            OrderError::UnknownStatus(_) | OrderError::CostOverflow => {
                ServiceError::Validation(err.to_string())
            }
            OrderError::NoItems => ServiceError::BadRequest("cart is empty".to_string()),
        }
    }
}

impl From<ProductError> for ServiceError {
    fn from(err: ProductError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

/// Convenience type alias for service results.
pub type Result<T> = std::result::Result<T, ServiceError>;
