//! Postgres-backed transaction store.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use stockflow_core::{Money, ProductId, TransactionId, TransactionType};
use stockflow_transactions::{Transaction, TransactionFilter};

use super::{TransactionStore, TransactionStoreError};

pub struct PostgresTransactionStore {
    pool: PgPool,
}

impl PostgresTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_transaction(row: &PgRow) -> Result<Transaction, TransactionStoreError> {
    let corrupt = |e: stockflow_core::DomainError| TransactionStoreError::Backend(format!("corrupt row: {e}"));

    let kind: String = row.try_get("type")?;
    let unit_price: Decimal = row.try_get("unit_price")?;
    let total_price: Decimal = row.try_get("total_price")?;

    Ok(Transaction {
        id: TransactionId::from_uuid(row.try_get::<Uuid, _>("id")?),
        date: row.try_get::<DateTime<Utc>, _>("date")?,
        kind: kind.parse::<TransactionType>().map_err(corrupt)?,
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        quantity: row.try_get("quantity")?,
        unit_price: Money::new(unit_price).map_err(corrupt)?,
        total_price: Money::new(total_price).map_err(corrupt)?,
        details: row.try_get("details")?,
    })
}

#[async_trait::async_trait]
impl TransactionStore for PostgresTransactionStore {
    async fn append(&self, transaction: Transaction) -> Result<Transaction, TransactionStoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO transactions (id, date, type, product_id, quantity, unit_price, total_price, details)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(transaction.id.as_uuid())
        .bind(transaction.date)
        .bind(transaction.kind.as_str())
        .bind(transaction.product_id.as_uuid())
        .bind(transaction.quantity)
        .bind(transaction.unit_price.amount())
        .bind(transaction.total_price.amount())
        .bind(&transaction.details)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TransactionStoreError::Duplicate(transaction.id));
        }
        Ok(transaction)
    }

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>, TransactionStoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, date, type, product_id, quantity, unit_price, total_price, details
            FROM transactions
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_transaction).transpose()
    }

    async fn query(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, TransactionStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, date, type, product_id, quantity, unit_price, total_price, details
            FROM transactions
            WHERE ($1::uuid IS NULL OR product_id = $1)
              AND ($2::timestamptz IS NULL OR date >= $2)
              AND ($3::timestamptz IS NULL OR date <= $3)
              AND ($4::text IS NULL OR type = $4)
            ORDER BY date DESC, id DESC
            "#,
        )
        .bind(filter.product_id.map(Uuid::from))
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(filter.kind.map(|k| k.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_transaction).collect()
    }
}
