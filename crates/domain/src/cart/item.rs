//! Cart line items.

use common::{CartId, Money, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::audit::Audit;

use super::CartError;

/// A product selection inside a cart.
///
/// The cost is always `quantity * unit_price`; every constructor and mutator
/// recalculates it, so the invariant holds after any change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    cart_id: CartId,
    product_id: ProductId,
    /// Price per unit, snapshotted when the item was last written.
    unit_price: Money,
    quantity: u32,
    cost: Money,
    /// Stock reported by the catalog at the time of the last check. Never persisted.
    #[serde(skip)]
    stock: Option<u32>,
    #[serde(flatten)]
    audit: Audit,
}

impl CartItem {
    /// Builds a new cart item.
    pub fn create(
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
        created_by: UserId,
    ) -> Result<Self, CartError> {
        validate(quantity, unit_price)?;

        let mut item = Self {
            cart_id,
            product_id,
            unit_price,
            quantity,
            cost: Money::zero(),
            stock: None,
            audit: Audit::created_by(created_by),
        };
        item.recalculate()?;
        Ok(item)
    }

    /// Rebuilds an item from persisted columns.
    ///
    /// The stored cost is not trusted; it is derived again from quantity and price.
    pub fn restore(
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
        audit: Audit,
    ) -> Result<Self, CartError> {
        let mut item = Self {
            cart_id,
            product_id,
            unit_price,
            quantity,
            cost: Money::zero(),
            stock: None,
            audit,
        };
        item.recalculate()?;
        Ok(item)
    }

    /// Combines a newly requested quantity with this item.
    ///
    /// The merged item carries the current unit price. Fails when the merged
    /// quantity would exceed `stock`.
    pub fn merge(
        &self,
        requested_quantity: u32,
        current_unit_price: Money,
        stock: u32,
        updated_by: UserId,
    ) -> Result<Self, CartError> {
        validate(requested_quantity, current_unit_price)?;

        let merged = u64::from(self.quantity) + u64::from(requested_quantity);
        if merged > u64::from(stock) {
            return Err(CartError::InsufficientStock {
                product_id: self.product_id,
                requested: merged,
                available: stock,
            });
        }

        let mut item = self.clone();
        // merged <= stock, so it fits in a u32
        item.quantity = merged as u32;
        item.unit_price = current_unit_price;
        item.stock = Some(stock);
        item.audit.touch(updated_by);
        item.recalculate()?;
        Ok(item)
    }

    /// Checks this item's quantity against the available stock.
    pub fn ensure_stock(&self, stock: u32) -> Result<(), CartError> {
        if self.quantity > stock {
            return Err(CartError::InsufficientStock {
                product_id: self.product_id,
                requested: u64::from(self.quantity),
                available: stock,
            });
        }
        Ok(())
    }

    /// Attaches a stock snapshot from the catalog.
    pub fn with_stock(mut self, stock: u32) -> Self {
        self.stock = Some(stock);
        self
    }

    /// Recomputes the cost from quantity and unit price.
    ///
    /// On overflow the item keeps its previous cost.
    pub fn recalculate(&mut self) -> Result<(), CartError> {
        self.cost = self
            .unit_price
            .checked_mul(self.quantity)
            .ok_or(CartError::CostOverflow {
                quantity: self.quantity,
                unit_price: self.unit_price,
            })?;
        Ok(())
    }
}

// Query methods
impl CartItem {
    pub fn cart_id(&self) -> CartId {
        self.cart_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn cost(&self) -> Money {
        self.cost
    }

    /// Stock snapshot from the last catalog check, if any.
    pub fn stock(&self) -> Option<u32> {
        self.stock
    }

    pub fn audit(&self) -> &Audit {
        &self.audit
    }
}

fn validate(quantity: u32, unit_price: Money) -> Result<(), CartError> {
    if quantity < 1 {
        return Err(CartError::InvalidQuantity { quantity });
    }
    if unit_price.is_negative() {
        return Err(CartError::InvalidPrice { price: unit_price });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: u32, price_cents: i64) -> CartItem {
        CartItem::create(
            CartId::new(),
            ProductId::new(),
            quantity,
            Money::from_cents(price_cents),
            UserId::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_create_derives_cost() {
        let item = item(3, 1999);
        assert_eq!(item.quantity(), 3);
        assert_eq!(item.cost().cents(), 5997);
        assert!(item.stock().is_none());
    }

    #[test]
    fn test_create_zero_quantity_fails() {
        let result = CartItem::create(
            CartId::new(),
            ProductId::new(),
            0,
            Money::from_cents(100),
            UserId::new(),
        );
        assert_eq!(result, Err(CartError::InvalidQuantity { quantity: 0 }));
    }

    #[test]
    fn test_create_negative_price_fails() {
        let result = CartItem::create(
            CartId::new(),
            ProductId::new(),
            1,
            Money::from_cents(-1),
            UserId::new(),
        );
        assert!(matches!(result, Err(CartError::InvalidPrice { .. })));
    }

    #[test]
    fn test_create_free_item_allowed() {
        let item = item(2, 0);
        assert!(item.cost().is_zero());
    }

    #[test]
    fn test_merge_accumulates_quantity() {
        let existing = item(2, 1000);
        let editor = UserId::new();

        let merged = existing
            .merge(3, Money::from_cents(1000), 10, editor)
            .unwrap();

        assert_eq!(merged.quantity(), 5);
        assert_eq!(merged.cost().cents(), 5000);
        assert_eq!(merged.stock(), Some(10));
        assert_eq!(merged.audit().updated_by, Some(editor));
        assert_eq!(merged.product_id(), existing.product_id());
        assert_eq!(merged.cart_id(), existing.cart_id());
    }

    #[test]
    fn test_merge_refreshes_unit_price() {
        let existing = item(2, 1000);
        let merged = existing
            .merge(1, Money::from_cents(1250), 10, UserId::new())
            .unwrap();

        assert_eq!(merged.unit_price().cents(), 1250);
        assert_eq!(merged.cost().cents(), 3750);
    }

    #[test]
    fn test_merge_up_to_exact_stock() {
        let existing = item(4, 100);
        let merged = existing
            .merge(6, Money::from_cents(100), 10, UserId::new())
            .unwrap();
        assert_eq!(merged.quantity(), 10);
    }

    #[test]
    fn test_merge_beyond_stock_fails() {
        let existing = item(4, 100);
        let result = existing.merge(7, Money::from_cents(100), 10, UserId::new());

        assert_eq!(
            result,
            Err(CartError::InsufficientStock {
                product_id: existing.product_id(),
                requested: 11,
                available: 10,
            })
        );
        // The original is untouched
        assert_eq!(existing.quantity(), 4);
    }

    #[test]
    fn test_merge_does_not_overflow() {
        let existing = item(u32::MAX, 1);
        let result = existing.merge(u32::MAX, Money::from_cents(1), u32::MAX, UserId::new());
        assert!(matches!(result, Err(CartError::InsufficientStock { .. })));
    }

    #[test]
    fn test_merge_zero_quantity_fails() {
        let existing = item(1, 100);
        let result = existing.merge(0, Money::from_cents(100), 10, UserId::new());
        assert!(matches!(result, Err(CartError::InvalidQuantity { .. })));
    }

    #[test]
    fn test_cost_invariant_holds_across_mutations() {
        let mut current = item(1, 333);
        for (requested, price) in [(1, 333), (4, 1), (2, 99_999), (10, 7)] {
            current = current
                .merge(requested, Money::from_cents(price), 1_000, UserId::new())
                .unwrap();
            assert_eq!(
                Some(current.cost()),
                current.unit_price().checked_mul(current.quantity())
            );
        }
        assert_eq!(current.quantity(), 18);
    }

    #[test]
    fn test_ensure_stock() {
        let item = item(5, 100);
        assert!(item.ensure_stock(5).is_ok());
        assert!(matches!(
            item.ensure_stock(4),
            Err(CartError::InsufficientStock { available: 4, .. })
        ));
    }

    #[test]
    fn test_restore_recomputes_cost() {
        let audit = Audit::created_by(UserId::new());
        let item = CartItem::restore(
            CartId::new(),
            ProductId::new(),
            2,
            Money::from_cents(1000),
            audit,
        )
        .unwrap();
        assert_eq!(item.cost().cents(), 2000);
    }

    #[test]
    fn test_create_cost_overflow_fails() {
        let price = Money::from_cents(i64::MAX / 2 + 1);
        let result = CartItem::create(CartId::new(), ProductId::new(), 2, price, UserId::new());
        assert_eq!(
            result,
            Err(CartError::CostOverflow {
                quantity: 2,
                unit_price: price,
            })
        );
    }

    #[test]
    fn test_merge_cost_overflow_fails() {
        let price = Money::from_cents(i64::MAX / 3);
        let existing = item(2, price.cents());

        let result = existing.merge(2, price, 10, UserId::new());

        assert!(matches!(
            result,
            Err(CartError::CostOverflow { quantity: 4, .. })
        ));
        assert_eq!(existing.quantity(), 2);
    }

    #[test]
    fn test_stock_is_not_serialized() {
        let item = item(1, 100).with_stock(42);
        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("stock").is_none());
        assert_eq!(json["quantity"], 1);
    }
}
