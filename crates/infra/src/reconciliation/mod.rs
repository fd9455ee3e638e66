//! Record of transactions whose stock mutation never landed.
//!
//! When the mutation workflow ends `Inconsistent`, the transaction is already
//! durable but the product's stock was not moved. Such transactions are kept
//! here until the original stock delta is replayed (same intent token) or an
//! operator resolves them by hand.
//!
//! ```text
//! pending ──► resolved
//!    │            ▲
//!    ▼            │
//! needs_operator ─┘   (permanent failure or attempts exhausted)
//! ```

pub mod in_memory;
pub mod postgres;
pub mod reconciler;

pub use in_memory::InMemoryReconciliationLog;
pub use postgres::PostgresReconciliationLog;
pub use reconciler::{DEFAULT_MAX_ATTEMPTS, Reconciler, ReconciliationReport};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockflow_core::{DomainResult, IntentToken, ProductId, TransactionId, TransactionType};
use stockflow_products::StockDelta;
use stockflow_transactions::Transaction;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStatus {
    /// Replayed by the periodic reconciler.
    Pending,
    /// No longer replayed automatically; waits for a manual resolution.
    NeedsOperator,
    Resolved,
}

impl ReconciliationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconciliationStatus::Pending => "pending",
            ReconciliationStatus::NeedsOperator => "needs_operator",
            ReconciliationStatus::Resolved => "resolved",
        }
    }
}

impl core::str::FromStr for ReconciliationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReconciliationStatus::Pending),
            "needs_operator" => Ok(ReconciliationStatus::NeedsOperator),
            "resolved" => Ok(ReconciliationStatus::Resolved),
            other => Err(format!("unknown reconciliation status {other:?}")),
        }
    }
}

/// A recorded transaction whose stock effect still has to be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationEntry {
    pub transaction_id: TransactionId,
    pub product_id: ProductId,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub quantity: i64,
    /// Why the workflow could not finish.
    pub reason: String,
    pub detected_at: DateTime<Utc>,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub status: ReconciliationStatus,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_note: Option<String>,
}

impl ReconciliationEntry {
    pub fn for_transaction(tx: &Transaction, reason: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            transaction_id: tx.id,
            product_id: tx.product_id,
            kind: tx.kind,
            quantity: tx.quantity,
            reason: reason.into(),
            detected_at: now,
            attempts: 0,
            last_error: None,
            status: ReconciliationStatus::Pending,
            resolved_at: None,
            resolution_note: None,
        }
    }

    /// The stock delta the workflow tried to apply, with its original token.
    pub fn delta(&self) -> DomainResult<StockDelta> {
        StockDelta::new(
            self.product_id,
            self.kind,
            self.quantity,
            IntentToken::from(self.transaction_id),
        )
    }

    pub fn is_pending(&self) -> bool {
        self.status == ReconciliationStatus::Pending
    }

    /// Pending or waiting for an operator.
    pub fn is_open(&self) -> bool {
        self.status != ReconciliationStatus::Resolved
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconciliationError {
    #[error("no reconciliation entry for transaction {0}")]
    NotFound(TransactionId),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for ReconciliationError {
    fn from(value: sqlx::Error) -> Self {
        ReconciliationError::Backend(value.to_string())
    }
}

#[async_trait::async_trait]
pub trait ReconciliationLog: Send + Sync {
    /// Idempotent: recording a transaction that is already logged returns the
    /// existing entry unchanged.
    async fn record(&self, entry: ReconciliationEntry) -> Result<ReconciliationEntry, ReconciliationError>;

    /// Entries the reconciler still replays, oldest first.
    async fn pending(&self) -> Result<Vec<ReconciliationEntry>, ReconciliationError>;

    /// Every entry not yet resolved (`pending` and `needs_operator`), oldest first.
    async fn open(&self) -> Result<Vec<ReconciliationEntry>, ReconciliationError>;

    async fn get(&self, id: TransactionId) -> Result<Option<ReconciliationEntry>, ReconciliationError>;

    /// Count a failed replay and remember its error. With `escalate`, a
    /// pending entry moves to `needs_operator` and is no longer replayed.
    async fn mark_attempt(
        &self,
        id: TransactionId,
        error: &str,
        escalate: bool,
    ) -> Result<ReconciliationEntry, ReconciliationError>;

    /// Close an open entry. Resolving an already resolved entry is a no-op.
    async fn resolve(&self, id: TransactionId, note: &str) -> Result<ReconciliationEntry, ReconciliationError>;
}

#[async_trait::async_trait]
impl<L> ReconciliationLog for Arc<L>
where
    L: ReconciliationLog + ?Sized,
{
    async fn record(&self, entry: ReconciliationEntry) -> Result<ReconciliationEntry, ReconciliationError> {
        (**self).record(entry).await
    }

    async fn pending(&self) -> Result<Vec<ReconciliationEntry>, ReconciliationError> {
        (**self).pending().await
    }

    async fn open(&self) -> Result<Vec<ReconciliationEntry>, ReconciliationError> {
        (**self).open().await
    }

    async fn get(&self, id: TransactionId) -> Result<Option<ReconciliationEntry>, ReconciliationError> {
        (**self).get(id).await
    }

    async fn mark_attempt(
        &self,
        id: TransactionId,
        error: &str,
        escalate: bool,
    ) -> Result<ReconciliationEntry, ReconciliationError> {
        (**self).mark_attempt(id, error, escalate).await
    }

    async fn resolve(&self, id: TransactionId, note: &str) -> Result<ReconciliationEntry, ReconciliationError> {
        (**self).resolve(id, note).await
    }
}
