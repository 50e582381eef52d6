//! Cart aggregate root.

use common::{CartId, Money, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::audit::Audit;

use super::{CartError, CartItem};

/// A user's in-progress collection of product selections.
///
/// Items are loaded on demand and are not part of the cart row itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    id: CartId,
    user_id: UserId,
    #[serde(flatten)]
    audit: Audit,
    items: Vec<CartItem>,
}

impl Cart {
    /// Creates an empty cart owned by `user_id`.
    pub fn new(user_id: UserId) -> Self {
        Self {
            id: CartId::new(),
            user_id,
            audit: Audit::created_by(user_id),
            items: Vec::new(),
        }
    }

    /// Rebuilds a cart header from persisted columns, without items.
    pub fn restore(id: CartId, user_id: UserId, audit: Audit) -> Self {
        Self {
            id,
            user_id,
            audit,
            items: Vec::new(),
        }
    }

    /// Attaches the items that belong to this cart, ignoring the rest.
    pub fn attach_items(&mut self, items: impl IntoIterator<Item = CartItem>) {
        let id = self.id;
        self.items
            .extend(items.into_iter().filter(|item| item.cart_id() == id));
    }

    /// Adds initial items to a cart that has not been persisted yet.
    pub fn with_items(mut self, items: impl IntoIterator<Item = CartItem>) -> Self {
        self.attach_items(items);
        self
    }

    /// Marks the cart as soft-deleted by `actor`.
    pub fn mark_deleted(&mut self, actor: UserId) {
        self.audit.mark_deleted(actor);
    }

    /// True iff both a deletion timestamp and a deleting actor are set.
    pub fn is_deleted(&self) -> bool {
        self.audit.is_deleted()
    }
}

// Query methods
impl Cart {
    pub fn id(&self) -> CartId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn audit(&self) -> &Audit {
        &self.audit
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Returns the item for a product, if present.
    pub fn get_item(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product_id() == product_id)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of the line costs.
    pub fn total_cost(&self) -> Result<Money, CartError> {
        Money::checked_sum(self.items.iter().map(CartItem::cost)).ok_or(CartError::TotalOverflow)
    }
}
