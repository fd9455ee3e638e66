//! Cross-service stock mutation workflow.
//!
//! ```text
//! Validating ──► Recorded ──► StockApplied ──► Committed
//!     │              │              │
//!     ▼              ▼              ▼
//!  Rejected       Rejected     Inconsistent
//! ```
//!
//! - `Validating`: input checks and a product read. No side effects.
//! - `Recorded`: the transaction is appended. From here on it is never undone.
//! - `StockApplied`: the stock delta is sent to the Product service with the
//!   transaction id as intent token, retried with bounded backoff.
//! - `Inconsistent`: the transaction exists but stock was not (provably)
//!   moved. The entry goes to the reconciliation log and an alert is logged.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tracing::{error, info, instrument, warn};

use stockflow_core::{DomainError, IntentToken, ProductId, TransactionId};
use stockflow_products::{Product, StockDelta};
use stockflow_transactions::{NewTransaction, Transaction};

use crate::history::TransactionView;
use crate::product_client::{ProductClient, ProductClientError};
use crate::reconciliation::{ReconciliationEntry, ReconciliationLog};
use crate::retry::{RetryPolicy, retry};
use crate::transaction_store::TransactionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Validating,
    Recorded,
    StockApplied,
    Committed,
    Rejected,
    Inconsistent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Applies to the product read and to the stock update.
    pub retry: RetryPolicy,
    /// Deadline for the whole workflow.
    pub workflow_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            workflow_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error(
        "transaction {transaction_id} was recorded but stock of product {product_id} was not updated: {reason}"
    )]
    StockReconciliationRequired {
        transaction_id: TransactionId,
        product_id: ProductId,
        reason: String,
    },
}

impl CoordinatorError {
    /// Terminal workflow state this error ends in.
    pub fn state(&self) -> WorkflowState {
        match self {
            CoordinatorError::StockReconciliationRequired { .. } => WorkflowState::Inconsistent,
            _ => WorkflowState::Rejected,
        }
    }
}

impl From<DomainError> for CoordinatorError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::InsufficientStock {
                requested,
                available,
            } => CoordinatorError::InsufficientStock {
                requested,
                available,
            },
            DomainError::Validation(msg)
            | DomainError::InvariantViolation(msg)
            | DomainError::InvalidId(msg) => CoordinatorError::Validation(msg),
        }
    }
}

/// Runs purchase/sale requests through the validate, record, mutate saga.
pub struct InventoryMutationCoordinator<C, T, R> {
    client: C,
    transactions: T,
    reconciliation: R,
    config: CoordinatorConfig,
}

impl<C, T, R> InventoryMutationCoordinator<C, T, R>
where
    C: ProductClient,
    T: TransactionStore,
    R: ReconciliationLog,
{
    pub fn new(client: C, transactions: T, reconciliation: R, config: CoordinatorConfig) -> Self {
        Self {
            client,
            transactions,
            reconciliation,
            config,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    #[instrument(
        skip(self, input),
        fields(product_id = %input.product_id, kind = %input.kind, quantity = input.quantity),
        err(Display)
    )]
    pub async fn create_transaction(&self, input: NewTransaction) -> Result<TransactionView, CoordinatorError> {
        let deadline = Instant::now() + self.config.workflow_timeout;

        // Validating
        input.validate()?;
        let product = self.validate_against_product(&input, deadline).await?;

        // Recorded
        if Instant::now() >= deadline {
            return Err(CoordinatorError::DependencyUnavailable(
                "workflow deadline exceeded before the transaction was recorded".to_string(),
            ));
        }
        let transaction = Transaction::record(TransactionId::new(), Utc::now(), input)?;
        let transaction = self.transactions.append(transaction).await.map_err(|e| {
            warn!(error = %e, "transaction append failed");
            CoordinatorError::DependencyUnavailable(e.to_string())
        })?;
        info!(
            transaction_id = %transaction.id,
            state = ?WorkflowState::Recorded,
            total_price = %transaction.total_price,
            "transaction recorded"
        );

        // StockApplied
        let delta = StockDelta::new(
            transaction.product_id,
            transaction.kind,
            transaction.quantity,
            IntentToken::from(transaction.id),
        )?;
        let policy = self.config.retry;
        let applied = timeout_at(
            deadline,
            retry(&policy, "apply_stock_delta", || self.client.apply_delta(&delta)),
        )
        .await;

        match applied {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(self.mark_inconsistent(&transaction, describe_apply_failure(&e)).await),
            Err(_) => {
                return Err(self
                    .mark_inconsistent(
                        &transaction,
                        "workflow deadline exceeded while updating stock".to_string(),
                    )
                    .await);
            }
        }
        info!(transaction_id = %transaction.id, state = ?WorkflowState::StockApplied, "stock updated");

        // Committed
        let current = match self.client.fetch(transaction.product_id).await {
            Ok(p) => p,
            Err(e) => {
                warn!(
                    transaction_id = %transaction.id,
                    error = %e,
                    "re-fetch after commit failed; reporting adjusted snapshot"
                );
                Product {
                    stock: product.stock + delta.signed(),
                    ..product
                }
            }
        };
        info!(
            transaction_id = %transaction.id,
            state = ?WorkflowState::Committed,
            product_stock = current.stock,
            "transaction committed"
        );
        Ok(TransactionView::new(transaction, Some(&current)))
    }

    async fn validate_against_product(
        &self,
        input: &NewTransaction,
        deadline: Instant,
    ) -> Result<Product, CoordinatorError> {
        let policy = self.config.retry;
        let product_id = input.product_id;
        let fetched = timeout_at(
            deadline,
            retry(&policy, "fetch_product", || self.client.fetch(product_id)),
        )
        .await;

        let product = match fetched {
            Ok(Ok(product)) => product,
            Ok(Err(ProductClientError::NotFound)) => {
                return Err(CoordinatorError::ProductNotFound(product_id));
            }
            Ok(Err(e)) => return Err(CoordinatorError::DependencyUnavailable(e.to_string())),
            Err(_) => {
                return Err(CoordinatorError::DependencyUnavailable(
                    "workflow deadline exceeded while reading the product".to_string(),
                ));
            }
        };

        // Early check only; the product store makes the authoritative one.
        product.stock_after(input.kind, input.quantity)?;
        Ok(product)
    }

    async fn mark_inconsistent(&self, transaction: &Transaction, reason: String) -> CoordinatorError {
        let entry = ReconciliationEntry::for_transaction(transaction, reason.clone(), Utc::now());
        if let Err(e) = self.reconciliation.record(entry).await {
            error!(
                alert = true,
                transaction_id = %transaction.id,
                error = %e,
                "failed to write reconciliation entry"
            );
        }

        error!(
            alert = true,
            transaction_id = %transaction.id,
            product_id = %transaction.product_id,
            state = ?WorkflowState::Inconsistent,
            reason = %reason,
            "transaction recorded but stock not updated; reconciliation required"
        );

        CoordinatorError::StockReconciliationRequired {
            transaction_id: transaction.id,
            product_id: transaction.product_id,
            reason,
        }
    }
}

fn describe_apply_failure(err: &ProductClientError) -> String {
    match err {
        ProductClientError::InsufficientStock(msg) => {
            format!("product store rejected the stock update: {msg}")
        }
        ProductClientError::NotFound => "product no longer exists".to_string(),
        other => other.to_string(),
    }
}

impl<C, T, R> InventoryMutationCoordinator<C, T, R>
where
    C: ProductClient + 'static,
    T: TransactionStore + 'static,
    R: ReconciliationLog + 'static,
{
    /// Run the workflow on its own task. Dropping the returned handle (or the
    /// future awaiting it) does not cancel the workflow.
    pub fn submit(
        self: &Arc<Self>,
        input: NewTransaction,
    ) -> JoinHandle<Result<TransactionView, CoordinatorError>> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.create_transaction(input).await })
    }
}
