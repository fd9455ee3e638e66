//! Append-only transaction store boundary (owned by the Transaction service).
//!
//! Transactions are never updated or deleted. `append` is the durability point
//! of the stock mutation workflow: once it returns, the record exists no matter
//! what happens to the remote stock update.

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryTransactionStore;
pub use postgres::PostgresTransactionStore;

use std::sync::Arc;

use thiserror::Error;

use stockflow_core::TransactionId;
use stockflow_transactions::{Transaction, TransactionFilter};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransactionStoreError {
    #[error("transaction {0} already exists")]
    Duplicate(TransactionId),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for TransactionStoreError {
    fn from(value: sqlx::Error) -> Self {
        TransactionStoreError::Backend(value.to_string())
    }
}

#[async_trait::async_trait]
pub trait TransactionStore: Send + Sync {
    /// Durably append a new record. Ids are unique; re-appending an id fails.
    async fn append(&self, transaction: Transaction) -> Result<Transaction, TransactionStoreError>;

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>, TransactionStoreError>;

    /// Matching records ordered by `date` descending, then `id` descending.
    async fn query(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, TransactionStoreError>;
}

#[async_trait::async_trait]
impl<S> TransactionStore for Arc<S>
where
    S: TransactionStore + ?Sized,
{
    async fn append(&self, transaction: Transaction) -> Result<Transaction, TransactionStoreError> {
        (**self).append(transaction).await
    }

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>, TransactionStoreError> {
        (**self).get(id).await
    }

    async fn query(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, TransactionStoreError> {
        (**self).query(filter).await
    }
}
