//! Postgres-backed reconciliation log (`stock_reconciliation` table).

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use stockflow_core::{ProductId, TransactionId, TransactionType};

use super::{ReconciliationEntry, ReconciliationError, ReconciliationLog, ReconciliationStatus};

const COLUMNS: &str = "transaction_id, product_id, type, quantity, reason, detected_at, \
                       attempts, last_error, status, resolved_at, resolution_note";

pub struct PostgresReconciliationLog {
    pool: PgPool,
}

impl PostgresReconciliationLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: TransactionId) -> Result<Option<ReconciliationEntry>, ReconciliationError> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM stock_reconciliation WHERE transaction_id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_entry).transpose()
    }

    async fn select(
        &self,
        statuses: &[ReconciliationStatus],
    ) -> Result<Vec<ReconciliationEntry>, ReconciliationError> {
        let statuses: Vec<&str> = statuses.iter().map(ReconciliationStatus::as_str).collect();
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM stock_reconciliation \
             WHERE status = ANY($1) ORDER BY detected_at ASC, transaction_id ASC"
        ))
        .bind(&statuses)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_entry).collect()
    }
}

fn row_to_entry(row: &PgRow) -> Result<ReconciliationEntry, ReconciliationError> {
    let corrupt = |msg: String| ReconciliationError::Backend(format!("corrupt row: {msg}"));

    let kind: String = row.try_get("type")?;
    let status: String = row.try_get("status")?;
    let attempts: i32 = row.try_get("attempts")?;

    Ok(ReconciliationEntry {
        transaction_id: TransactionId::from_uuid(row.try_get::<Uuid, _>("transaction_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        kind: kind
            .parse::<TransactionType>()
            .map_err(|e| corrupt(e.to_string()))?,
        quantity: row.try_get("quantity")?,
        reason: row.try_get("reason")?,
        detected_at: row.try_get::<DateTime<Utc>, _>("detected_at")?,
        attempts: u32::try_from(attempts).map_err(|e| corrupt(e.to_string()))?,
        last_error: row.try_get("last_error")?,
        status: status.parse::<ReconciliationStatus>().map_err(corrupt)?,
        resolved_at: row.try_get("resolved_at")?,
        resolution_note: row.try_get("resolution_note")?,
    })
}

#[async_trait::async_trait]
impl ReconciliationLog for PostgresReconciliationLog {
    async fn record(&self, entry: ReconciliationEntry) -> Result<ReconciliationEntry, ReconciliationError> {
        sqlx::query(
            r#"
            INSERT INTO stock_reconciliation
                (transaction_id, product_id, type, quantity, reason, detected_at, status)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending')
            ON CONFLICT (transaction_id) DO NOTHING
            "#,
        )
        .bind(entry.transaction_id.as_uuid())
        .bind(entry.product_id.as_uuid())
        .bind(entry.kind.as_str())
        .bind(entry.quantity)
        .bind(&entry.reason)
        .bind(entry.detected_at)
        .execute(&self.pool)
        .await?;

        self.fetch(entry.transaction_id)
            .await?
            .ok_or(ReconciliationError::NotFound(entry.transaction_id))
    }

    async fn pending(&self) -> Result<Vec<ReconciliationEntry>, ReconciliationError> {
        self.select(&[ReconciliationStatus::Pending]).await
    }

    async fn open(&self) -> Result<Vec<ReconciliationEntry>, ReconciliationError> {
        self.select(&[ReconciliationStatus::Pending, ReconciliationStatus::NeedsOperator])
            .await
    }

    async fn get(&self, id: TransactionId) -> Result<Option<ReconciliationEntry>, ReconciliationError> {
        self.fetch(id).await
    }

    async fn mark_attempt(
        &self,
        id: TransactionId,
        error: &str,
        escalate: bool,
    ) -> Result<ReconciliationEntry, ReconciliationError> {
        let row = sqlx::query(&format!(
            "UPDATE stock_reconciliation SET attempts = attempts + 1, last_error = $2, \
             status = CASE WHEN $3 AND status = 'pending' THEN 'needs_operator' ELSE status END \
             WHERE transaction_id = $1 RETURNING {COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(error)
        .bind(escalate)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref()
            .map(row_to_entry)
            .transpose()?
            .ok_or(ReconciliationError::NotFound(id))
    }

    async fn resolve(&self, id: TransactionId, note: &str) -> Result<ReconciliationEntry, ReconciliationError> {
        sqlx::query(
            r#"
            UPDATE stock_reconciliation
            SET status = 'resolved', resolved_at = $2, resolution_note = $3
            WHERE transaction_id = $1 AND status IN ('pending', 'needs_operator')
            "#,
        )
        .bind(id.as_uuid())
        .bind(Utc::now())
        .bind(note)
        .execute(&self.pool)
        .await?;

        self.fetch(id).await?.ok_or(ReconciliationError::NotFound(id))
    }
}
