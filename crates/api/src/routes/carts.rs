//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use checkout::ServiceError;
use domain::{Cart, CartItem, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::routes::parse_id;
use crate::state::{AppState, AppStore};

// -- Request types --

#[derive(Deserialize)]
pub struct AddToCartRequest {
    pub product_id: String,
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartItemResponse {
    pub cart_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub cost_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<u32>,
}

impl From<&CartItem> for CartItemResponse {
    fn from(item: &CartItem) -> Self {
        Self {
            cart_id: item.cart_id().to_string(),
            product_id: item.product_id().to_string(),
            quantity: item.quantity(),
            unit_price_cents: item.unit_price().cents(),
            cost_cents: item.cost().cents(),
            stock: item.stock(),
        }
    }
}

#[derive(Serialize)]
pub struct CartResponse {
    pub id: String,
    pub user_id: String,
    pub items: Vec<CartItemResponse>,
    pub total_cost_cents: i64,
    pub created_at: String,
}

impl TryFrom<&Cart> for CartResponse {
    type Error = ApiError;

    fn try_from(cart: &Cart) -> Result<Self, Self::Error> {
        let total = cart.total_cost().map_err(ServiceError::from)?;
        Ok(Self {
            id: cart.id().to_string(),
            user_id: cart.user_id().to_string(),
            items: cart.items().iter().map(CartItemResponse::from).collect(),
            total_cost_cents: total.cents(),
            created_at: cart.audit().created_at.to_rfc3339(),
        })
    }
}

// -- Handlers --

/// POST /carts — add a product to the caller's cart.
#[tracing::instrument(skip(state, req))]
pub async fn add<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<CartItemResponse>), ApiError> {
    let product_id: ProductId = parse_id("product", &req.product_id)?;
    let item = state
        .carts
        .add_to_cart(user_id, product_id, req.quantity)
        .await?;

    Ok((StatusCode::CREATED, Json(CartItemResponse::from(&item))))
}

/// GET /carts — the caller's cart with items.
#[tracing::instrument(skip(state))]
pub async fn get<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.carts.get_cart(user_id).await?;
    Ok(Json(CartResponse::try_from(&cart)?))
}
