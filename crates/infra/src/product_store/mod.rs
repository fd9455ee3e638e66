//! Product store boundary (owned by the Product service).
//!
//! The store owns product records and is the authority on stock. Its
//! `apply_delta` is the only way stock changes in response to a transaction,
//! and it must:
//! - check and mutate stock in one storage transaction (no negative stock)
//! - apply each intent token at most once (a replay reports the earlier outcome)
//! - forget tokens whose mutation was rejected, so a later retry can succeed
//!
//! Applied tokens are kept for a retention window (see [`retention`]) and then
//! pruned. A token replayed after its window would be applied again, so the
//! window must outlast every retry and reconciliation of the same transaction.

pub mod in_memory;
pub mod postgres;
pub mod retention;

pub use in_memory::InMemoryProductStore;
pub use postgres::PostgresProductStore;
pub use retention::{IntentRetention, spawn_intent_pruner};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use stockflow_core::{DomainError, ProductId};
use stockflow_products::{NewProduct, Product, ProductUpdate, StockDelta};

/// Result of a successful `apply_delta`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StockOutcome {
    /// The delta was applied by this call.
    Applied { stock: i64 },
    /// The token had already been applied; stock was left untouched.
    AlreadyApplied { stock: i64 },
}

impl StockOutcome {
    pub fn stock(&self) -> i64 {
        match self {
            StockOutcome::Applied { stock } | StockOutcome::AlreadyApplied { stock } => *stock,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProductStoreError {
    #[error("product not found")]
    NotFound,

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    #[error("validation failed: {0}")]
    Validation(String),

    /// The intent token was already used for a different mutation.
    #[error("intent token conflict: {0}")]
    TokenConflict(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<DomainError> for ProductStoreError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::InsufficientStock {
                requested,
                available,
            } => ProductStoreError::InsufficientStock {
                requested,
                available,
            },
            DomainError::Validation(msg)
            | DomainError::InvariantViolation(msg)
            | DomainError::InvalidId(msg) => ProductStoreError::Validation(msg),
        }
    }
}

impl From<sqlx::Error> for ProductStoreError {
    fn from(value: sqlx::Error) -> Self {
        ProductStoreError::Backend(value.to_string())
    }
}

#[async_trait::async_trait]
pub trait ProductStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Product>, ProductStoreError>;

    async fn get(&self, id: ProductId) -> Result<Option<Product>, ProductStoreError>;

    async fn create(&self, input: NewProduct) -> Result<Product, ProductStoreError>;

    /// Replace a product's mutable fields. Fails with `NotFound` if absent.
    async fn update(&self, id: ProductId, input: ProductUpdate) -> Result<Product, ProductStoreError>;

    /// Returns `false` when there was nothing to delete.
    async fn delete(&self, id: ProductId) -> Result<bool, ProductStoreError>;

    /// Atomically check and apply a stock movement, at most once per token.
    async fn apply_delta(&self, delta: &StockDelta) -> Result<StockOutcome, ProductStoreError>;

    /// Forget tokens applied before `cutoff`. Returns how many were removed.
    async fn prune_intents(&self, cutoff: DateTime<Utc>) -> Result<u64, ProductStoreError>;
}

#[async_trait::async_trait]
impl<S> ProductStore for Arc<S>
where
    S: ProductStore + ?Sized,
{
    async fn list(&self) -> Result<Vec<Product>, ProductStoreError> {
        (**self).list().await
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>, ProductStoreError> {
        (**self).get(id).await
    }

    async fn create(&self, input: NewProduct) -> Result<Product, ProductStoreError> {
        (**self).create(input).await
    }

    async fn update(&self, id: ProductId, input: ProductUpdate) -> Result<Product, ProductStoreError> {
        (**self).update(id, input).await
    }

    async fn delete(&self, id: ProductId) -> Result<bool, ProductStoreError> {
        (**self).delete(id).await
    }

    async fn apply_delta(&self, delta: &StockDelta) -> Result<StockOutcome, ProductStoreError> {
        (**self).apply_delta(delta).await
    }

    async fn prune_intents(&self, cutoff: DateTime<Utc>) -> Result<u64, ProductStoreError> {
        (**self).prune_intents(cutoff).await
    }
}
