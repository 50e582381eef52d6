use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartId, Money, OrderId, ProductId, UserId};
use domain::{Audit, Cart, CartItem, Order, OrderError, OrderItem, OrderStatus, Product};
use sqlx::{
    PgPool, Postgres, QueryBuilder, Row,
    postgres::{PgPoolOptions, PgRow},
};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{CartStore, ItemAddition, OrderStore, ProductCatalog, verify_transfer},
};

const CART_COLUMNS: &str =
    "id, user_id, created_at, created_by, updated_at, updated_by, deleted_at, deleted_by";
const CART_ITEM_COLUMNS: &str = "cart_id, product_id, quantity, unit_price_cents, \
     created_at, created_by, updated_at, updated_by";
const ORDER_COLUMNS: &str = "id, user_id, status, created_at, created_by, \
     updated_at, updated_by, deleted_at, deleted_by";
const ORDER_ITEM_COLUMNS: &str = "order_id, product_id, quantity, unit_price_cents, \
     created_at, created_by, updated_at, updated_by";
const PRODUCT_COLUMNS: &str = "id, name, price_cents, stock, created_at, created_by, \
     updated_at, updated_by, deleted_at, deleted_by";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool of at most `max_connections` to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_audit(row: &PgRow, soft_delete: bool) -> Result<Audit> {
        let (deleted_at, deleted_by) = if soft_delete {
            (
                row.try_get::<Option<DateTime<Utc>>, _>("deleted_at")?,
                row.try_get::<Option<Uuid>, _>("deleted_by")?
                    .map(UserId::from_uuid),
            )
        } else {
            (None, None)
        };

        Ok(Audit {
            created_at: row.try_get("created_at")?,
            created_by: UserId::from_uuid(row.try_get::<Uuid, _>("created_by")?),
            updated_at: row.try_get("updated_at")?,
            updated_by: row
                .try_get::<Option<Uuid>, _>("updated_by")?
                .map(UserId::from_uuid),
            deleted_at,
            deleted_by,
        })
    }

    fn row_to_cart(row: &PgRow) -> Result<Cart> {
        Ok(Cart::restore(
            CartId::from_uuid(row.try_get::<Uuid, _>("id")?),
            UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            Self::row_to_audit(row, true)?,
        ))
    }

    fn row_to_cart_item(row: &PgRow) -> Result<CartItem> {
        CartItem::restore(
            CartId::from_uuid(row.try_get::<Uuid, _>("cart_id")?),
            ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            to_u32("quantity", row.try_get("quantity")?)?,
            Money::from_cents(row.try_get("unit_price_cents")?),
            Self::row_to_audit(row, false)?,
        )
        .map_err(|e| StoreError::InvalidData(e.to_string()))
    }

    fn row_to_order_item(row: &PgRow) -> Result<OrderItem> {
        OrderItem::restore(
            OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            to_u32("quantity", row.try_get("quantity")?)?,
            Money::from_cents(row.try_get("unit_price_cents")?),
            Self::row_to_audit(row, false)?,
        )
        .map_err(invalid_order)
    }

    fn row_to_order(row: &PgRow, items: Vec<OrderItem>) -> Result<Order> {
        let status: String = row.try_get("status")?;
        let status: OrderStatus = status.parse().map_err(invalid_order)?;

        Order::restore(
            OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            status,
            Self::row_to_audit(row, true)?,
            items,
        )
        .map_err(invalid_order)
    }

    fn row_to_product(row: &PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock: to_u32("stock", row.try_get("stock")?)?,
            audit: Self::row_to_audit(row, true)?,
        })
    }

    async fn insert_cart_items(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        items: &[CartItem],
    ) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO cart_item (cart_id, product_id, quantity, unit_price_cents, cost_cents, \
             created_at, created_by) ",
        );
        builder.push_values(items, |mut row, item| {
            row.push_bind(item.cart_id().as_uuid())
                .push_bind(item.product_id().as_uuid())
                .push_bind(i64::from(item.quantity()))
                .push_bind(item.unit_price().cents())
                .push_bind(item.cost().cents())
                .push_bind(item.audit().created_at)
                .push_bind(item.audit().created_by.as_uuid());
        });

        builder
            .build()
            .execute(&mut **tx)
            .await
            .map_err(|e| conflict_on(e, "cart_item_pkey", "duplicate product in cart"))?;
        Ok(())
    }
}

/// Converts a BIGINT column into a `u32`, rejecting out-of-range values.
fn to_u32(column: &str, value: i64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::InvalidData(format!("{column} out of range: {value}")))
}

fn invalid_order(err: OrderError) -> StoreError {
    StoreError::InvalidData(err.to_string())
}

/// Maps a unique-constraint violation on `constraint` to a conflict.
fn conflict_on(err: sqlx::Error, constraint: &str, message: &str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.constraint() == Some(constraint)
    {
        return StoreError::Conflict(message.to_string());
    }
    StoreError::Database(err)
}

#[async_trait]
impl CartStore for PostgresStore {
    async fn resolve_by_user_id(&self, user_id: UserId) -> Result<Cart> {
        let row = sqlx::query(&format!(
            "SELECT {CART_COLUMNS} FROM cart WHERE user_id = $1 AND deleted_at IS NULL"
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_cart(&row),
            None => Err(StoreError::not_found("cart", user_id)),
        }
    }

    async fn exists_by_user_id(&self, user_id: UserId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM cart WHERE user_id = $1 AND deleted_at IS NULL)",
        )
        .bind(user_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn resolve_items_by_cart_ids(&self, cart_ids: &[CartId]) -> Result<Vec<CartItem>> {
        if cart_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = cart_ids.iter().map(CartId::as_uuid).collect();
        let rows = sqlx::query(&format!(
            "SELECT {CART_ITEM_COLUMNS} FROM cart_item WHERE cart_id = ANY($1) \
             ORDER BY created_at ASC, product_id ASC"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_cart_item).collect()
    }

    async fn create_cart(&self, cart: Cart) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO cart (id, user_id, created_at, created_by)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(cart.id().as_uuid())
        .bind(cart.user_id().as_uuid())
        .bind(cart.audit().created_at)
        .bind(cart.audit().created_by.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on(e, "cart_active_user_key", "user already has an active cart"))?;

        Self::insert_cart_items(&mut tx, cart.items()).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn add_or_update_item(
        &self,
        user_id: UserId,
        addition: ItemAddition,
    ) -> Result<CartItem> {
        let mut tx = self.pool.begin().await?;

        // The no-op update takes the cart row lock, serializing every
        // addition to this cart until the transaction ends.
        let cart_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO cart (id, user_id, created_at, created_by)
            VALUES ($1, $2, $3, $2)
            ON CONFLICT (user_id) WHERE deleted_at IS NULL
            DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id.as_uuid())
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;
        let cart_id = CartId::from_uuid(cart_id);

        let existing = sqlx::query(&format!(
            "SELECT {CART_ITEM_COLUMNS} FROM cart_item \
             WHERE cart_id = $1 AND product_id = $2 FOR UPDATE"
        ))
        .bind(cart_id.as_uuid())
        .bind(addition.product_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;

        let item = match existing {
            Some(row) => {
                let merged = Self::row_to_cart_item(&row)?.merge(
                    addition.quantity,
                    addition.unit_price,
                    addition.stock,
                    user_id,
                )?;

                sqlx::query(
                    r#"
                    UPDATE cart_item
                    SET quantity = $1, unit_price_cents = $2, cost_cents = $3,
                        updated_at = $4, updated_by = $5
                    WHERE cart_id = $6 AND product_id = $7
                    "#,
                )
                .bind(i64::from(merged.quantity()))
                .bind(merged.unit_price().cents())
                .bind(merged.cost().cents())
                .bind(merged.audit().updated_at)
                .bind(merged.audit().updated_by.map(|u| u.as_uuid()))
                .bind(cart_id.as_uuid())
                .bind(addition.product_id.as_uuid())
                .execute(&mut *tx)
                .await?;

                tracing::debug!(
                    %cart_id,
                    product_id = %addition.product_id,
                    quantity = merged.quantity(),
                    "merged cart item"
                );
                merged
            }
            None => {
                let item = CartItem::create(
                    cart_id,
                    addition.product_id,
                    addition.quantity,
                    addition.unit_price,
                    user_id,
                )?;
                item.ensure_stock(addition.stock)?;
                Self::insert_cart_items(&mut tx, std::slice::from_ref(&item)).await?;
                item.with_stock(addition.stock)
            }
        };

        tx.commit().await?;
        Ok(item)
    }

    async fn current_quantity(&self, cart_id: CartId, product_id: ProductId) -> Result<u32> {
        let quantity: Option<i64> = sqlx::query_scalar(
            "SELECT quantity FROM cart_item WHERE cart_id = $1 AND product_id = $2",
        )
        .bind(cart_id.as_uuid())
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        quantity.map_or(Ok(0), |q| to_u32("quantity", q))
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn exists_by_id(&self, order_id: OrderId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(order_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn create_and_transfer(&self, order: &Order, cart_id: CartId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, status, total_cost_cents, created_at, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.user_id().as_uuid())
        .bind(order.status().as_str())
        .bind(order.total_cost().cents())
        .bind(order.audit().created_at)
        .bind(order.audit().created_by.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on(e, "orders_pkey", "order already exists"))?;

        if !order.items().is_empty() {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO order_item (order_id, product_id, quantity, unit_price_cents, \
                 cost_cents, created_at, created_by) ",
            );
            builder.push_values(order.items(), |mut row, item| {
                row.push_bind(item.order_id().as_uuid())
                    .push_bind(item.product_id().as_uuid())
                    .push_bind(i64::from(item.quantity()))
                    .push_bind(item.unit_price().cents())
                    .push_bind(item.cost().cents())
                    .push_bind(item.audit().created_at)
                    .push_bind(item.audit().created_by.as_uuid());
            });
            builder.build().execute(&mut *tx).await?;
        }

        let product_ids: Vec<Uuid> = order
            .product_ids()
            .iter()
            .map(ProductId::as_uuid)
            .collect();
        let rows = sqlx::query(
            r#"
            DELETE FROM cart_item
            WHERE cart_id = $1 AND product_id = ANY($2)
            RETURNING product_id, quantity
            "#,
        )
        .bind(cart_id.as_uuid())
        .bind(product_ids)
        .fetch_all(&mut *tx)
        .await?;

        let removed = rows
            .iter()
            .map(|row| -> Result<(ProductId, u32)> {
                Ok((
                    ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
                    to_u32("quantity", row.try_get("quantity")?)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        // Returning early drops the transaction, which rolls it back.
        verify_transfer(order, &removed)?;

        tx.commit().await?;
        tracing::debug!(
            order_id = %order.id(),
            %cart_id,
            items = removed.len(),
            "transferred cart items into order"
        );
        Ok(())
    }

    async fn resolve_by_id(&self, order_id: OrderId) -> Result<Order> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found("order", order_id))?;

        let items = sqlx::query(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_item WHERE order_id = $1 \
             ORDER BY created_at ASC, product_id ASC"
        ))
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(Self::row_to_order_item)
        .collect::<Result<Vec<_>>>()?;

        Self::row_to_order(&row, items)
    }

    async fn resolve_orders_by_user_id(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 AND deleted_at IS NULL \
             ORDER BY created_at DESC, id ASC"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut items_by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        let item_rows = sqlx::query(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_item WHERE order_id = ANY($1) \
             ORDER BY created_at ASC, product_id ASC"
        ))
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;
        for row in &item_rows {
            let item = Self::row_to_order_item(row)?;
            items_by_order.entry(item.order_id()).or_default().push(item);
        }

        rows.iter()
            .map(|row| -> Result<Order> {
                let id = OrderId::from_uuid(row.try_get::<Uuid, _>("id")?);
                let items = items_by_order.remove(&id).unwrap_or_default();
                Self::row_to_order(row, items)
            })
            .collect()
    }

    async fn update_status(&self, order: &Order, previous: OrderStatus) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $1, updated_at = $2, updated_by = $3
            WHERE id = $4 AND status = $5 AND deleted_at IS NULL
            "#,
        )
        .bind(order.status().as_str())
        .bind(order.audit().updated_at)
        .bind(order.audit().updated_by.map(|u| u.as_uuid()))
        .bind(order.id().as_uuid())
        .bind(previous.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            if self.exists_by_id(order.id()).await? {
                return Err(StoreError::Conflict(format!(
                    "order {} is no longer {}",
                    order.id(),
                    previous
                )));
            }
            return Err(StoreError::not_found("order", order.id()));
        }

        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for PostgresStore {
    async fn price_and_stock(&self, product_id: ProductId) -> Result<(Money, u32)> {
        let row = sqlx::query(
            "SELECT price_cents, stock FROM product WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found("product", product_id))?;

        Ok((
            Money::from_cents(row.try_get("price_cents")?),
            to_u32("stock", row.try_get("stock")?)?,
        ))
    }

    async fn create_product(&self, product: Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO product (id, name, price_cents, stock, created_at, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(i64::from(product.stock))
        .bind(product.audit.created_at)
        .bind(product.audit.created_by.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on(e, "product_pkey", "product already exists"))?;

        Ok(())
    }

    async fn resolve_product(&self, product_id: ProductId) -> Result<Product> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found("product", product_id))?;

        Self::row_to_product(&row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_u32_rejects_out_of_range() {
        assert_eq!(to_u32("quantity", 7).unwrap(), 7);
        assert!(matches!(
            to_u32("quantity", -1),
            Err(StoreError::InvalidData(_))
        ));
        assert!(matches!(
            to_u32("stock", i64::from(u32::MAX) + 1),
            Err(StoreError::InvalidData(_))
        ));
    }

    #[test]
    fn test_conflict_on_passes_through_other_errors() {
        let err = conflict_on(sqlx::Error::RowNotFound, "cart_pkey", "duplicate");
        assert!(matches!(err, StoreError::Database(sqlx::Error::RowNotFound)));
    }
}
