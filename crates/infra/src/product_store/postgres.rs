//! Postgres-backed product store.
//!
//! `apply_delta` runs in one SQL transaction: the intent row is inserted
//! first (a conflicting insert blocks until a concurrent holder of the same
//! token commits or rolls back), then stock is moved with a guarded `UPDATE`.
//! Any rejection rolls the transaction back, which also discards the intent
//! row.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use stockflow_core::{Money, ProductId};
use stockflow_products::{NewProduct, Product, ProductUpdate, StockDelta};

use super::{ProductStore, ProductStoreError, StockOutcome};

pub struct PostgresProductStore {
    pool: PgPool,
}

impl PostgresProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_PRODUCT: &str = r#"
    SELECT id, name, category, description, price, stock, created_at, updated_at
    FROM products
"#;

fn row_to_product(row: &PgRow) -> Result<Product, ProductStoreError> {
    let price: Decimal = row.try_get("price")?;
    Ok(Product {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        category: row.try_get("category")?,
        description: row.try_get("description")?,
        price: Money::new(price)?,
        stock: row.try_get("stock")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

#[async_trait::async_trait]
impl ProductStore for PostgresProductStore {
    async fn list(&self) -> Result<Vec<Product>, ProductStoreError> {
        let rows = sqlx::query(&format!("{SELECT_PRODUCT} ORDER BY name ASC, id ASC"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_product).collect()
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>, ProductStoreError> {
        let row = sqlx::query(&format!("{SELECT_PRODUCT} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_product).transpose()
    }

    async fn create(&self, input: NewProduct) -> Result<Product, ProductStoreError> {
        let product = Product::create(ProductId::new(), input, Utc::now())?;
        sqlx::query(
            r#"
            INSERT INTO products (id, name, category, description, price, stock, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.category)
        .bind(&product.description)
        .bind(product.price.amount())
        .bind(product.stock)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(product)
    }

    async fn update(&self, id: ProductId, input: ProductUpdate) -> Result<Product, ProductStoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!("{SELECT_PRODUCT} WHERE id = $1 FOR UPDATE"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(ProductStoreError::NotFound)?;
        let mut product = row_to_product(&row)?;
        product.update(input, Utc::now())?;

        sqlx::query(
            r#"
            UPDATE products
            SET name = $2, category = $3, description = $4, price = $5, stock = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(&product.name)
        .bind(&product.category)
        .bind(&product.description)
        .bind(product.price.amount())
        .bind(product.stock)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(product)
    }

    async fn delete(&self, id: ProductId) -> Result<bool, ProductStoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn apply_delta(&self, delta: &StockDelta) -> Result<StockOutcome, ProductStoreError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1 FOR UPDATE")
            .bind(delta.product_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;
        let Some(current) = current else {
            return Err(ProductStoreError::NotFound);
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO stock_intents (intent_token, product_id, delta)
            VALUES ($1, $2, $3)
            ON CONFLICT (intent_token) DO NOTHING
            "#,
        )
        .bind(delta.intent_token.as_uuid())
        .bind(delta.product_id.as_uuid())
        .bind(delta.signed())
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            let previous = sqlx::query("SELECT product_id, delta FROM stock_intents WHERE intent_token = $1")
                .bind(delta.intent_token.as_uuid())
                .fetch_one(&mut *tx)
                .await?;
            let previous_product: Uuid = previous.try_get("product_id")?;
            let previous_delta: i64 = previous.try_get("delta")?;
            if previous_product != *delta.product_id.as_uuid() || previous_delta != delta.signed() {
                return Err(ProductStoreError::TokenConflict(format!(
                    "token {} was applied as {previous_delta:+} to product {previous_product}",
                    delta.intent_token
                )));
            }
            tracing::debug!(
                intent_token = %delta.intent_token,
                product_id = %delta.product_id,
                "replayed stock intent ignored"
            );
            return Ok(StockOutcome::AlreadyApplied { stock: current });
        }

        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock + $2, updated_at = NOW()
            WHERE id = $1 AND stock + $2 >= 0
            RETURNING stock
            "#,
        )
        .bind(delta.product_id.as_uuid())
        .bind(delta.signed())
        .fetch_optional(&mut *tx)
        .await?;

        match updated {
            Some(stock) => {
                tx.commit().await?;
                Ok(StockOutcome::Applied { stock })
            }
            // Dropping `tx` rolls back the intent row.
            None => Err(ProductStoreError::InsufficientStock {
                requested: delta.quantity,
                available: current,
            }),
        }
    }

    async fn prune_intents(&self, cutoff: DateTime<Utc>) -> Result<u64, ProductStoreError> {
        let deleted = sqlx::query("DELETE FROM stock_intents WHERE applied_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(deleted.rows_affected())
    }
}
