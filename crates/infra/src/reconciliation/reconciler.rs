use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

use stockflow_core::TransactionId;

use super::{ReconciliationEntry, ReconciliationError, ReconciliationLog};
use crate::periodic::{PeriodicHandle, spawn_periodic};
use crate::product_client::ProductClient;
use crate::retry::Transient;

/// Replays per entry before it is handed to an operator.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Outcome of one pass over the pending entries.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub examined: usize,
    pub resolved: usize,
    pub still_pending: usize,
    /// Moved to `needs_operator` during this pass.
    pub needs_operator: usize,
}

enum Replay {
    Resolved,
    Retry,
    Escalated,
}

/// Replays the stock deltas of `Inconsistent` transactions.
///
/// Each replay carries the transaction's own intent token, so a delta that
/// actually landed earlier (lost response, late timeout) is not applied twice.
/// The transaction store is never touched.
///
/// Only transient failures are retried on later passes, and at most
/// `max_attempts` times in total. Anything else is escalated to
/// `needs_operator`.
pub struct Reconciler<C, L> {
    client: C,
    log: L,
    max_attempts: u32,
}

impl<C, L> Reconciler<C, L>
where
    C: ProductClient,
    L: ReconciliationLog,
{
    pub fn new(client: C, log: L) -> Self {
        Self {
            client,
            log,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Zero is treated as one.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub async fn reconcile_pending(&self) -> Result<ReconciliationReport, ReconciliationError> {
        let pending = self.log.pending().await?;
        let mut report = ReconciliationReport {
            examined: pending.len(),
            ..Default::default()
        };

        for entry in pending {
            match self.replay(&entry).await? {
                Replay::Resolved => report.resolved += 1,
                Replay::Retry => report.still_pending += 1,
                Replay::Escalated => report.needs_operator += 1,
            }
        }

        if report.examined > 0 {
            info!(
                examined = report.examined,
                resolved = report.resolved,
                still_pending = report.still_pending,
                needs_operator = report.needs_operator,
                "reconciliation pass finished"
            );
        }
        Ok(report)
    }

    async fn replay(&self, entry: &ReconciliationEntry) -> Result<Replay, ReconciliationError> {
        // A delta that cannot be rebuilt will never apply.
        let attempt = match entry.delta() {
            Ok(delta) => self.client.apply_delta(&delta).await.map_err(|e| (e.to_string(), e.is_transient())),
            Err(e) => Err((e.to_string(), false)),
        };

        match attempt {
            Ok(()) => {
                self.log
                    .resolve(entry.transaction_id, "stock delta applied by reconciler")
                    .await?;
                info!(
                    transaction_id = %entry.transaction_id,
                    product_id = %entry.product_id,
                    "stock reconciled"
                );
                Ok(Replay::Resolved)
            }
            Err((message, transient)) => {
                let exhausted = entry.attempts.saturating_add(1) >= self.max_attempts;
                let escalate = !transient || exhausted;
                let updated = self
                    .log
                    .mark_attempt(entry.transaction_id, &message, escalate)
                    .await?;

                if escalate {
                    error!(
                        alert = true,
                        transaction_id = %entry.transaction_id,
                        product_id = %entry.product_id,
                        attempts = updated.attempts,
                        transient,
                        error = %message,
                        "stock reconciliation needs an operator"
                    );
                    Ok(Replay::Escalated)
                } else {
                    warn!(
                        transaction_id = %entry.transaction_id,
                        product_id = %entry.product_id,
                        attempts = updated.attempts,
                        error = %message,
                        "stock reconciliation attempt failed"
                    );
                    Ok(Replay::Retry)
                }
            }
        }
    }

    /// Close an open entry by hand (e.g. the product was deleted or stock was
    /// fixed out of band).
    pub async fn resolve_manually(
        &self,
        id: TransactionId,
        note: &str,
    ) -> Result<ReconciliationEntry, ReconciliationError> {
        let entry = self.log.resolve(id, note).await?;
        info!(transaction_id = %id, note, "reconciliation entry resolved manually");
        Ok(entry)
    }
}

impl<C, L> Reconciler<C, L>
where
    C: ProductClient + 'static,
    L: ReconciliationLog + 'static,
{
    /// Run `reconcile_pending` every `interval`. A zero interval disables the
    /// task and returns `None`. Failures are logged, never propagated.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> Option<PeriodicHandle> {
        spawn_periodic("reconciler", interval, move || {
            let this = Arc::clone(&self);
            async move {
                if let Err(e) = this.reconcile_pending().await {
                    error!(error = %e, "reconciliation pass failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use stockflow_core::{IntentToken, TransactionType};
    use stockflow_products::StockDelta;
    use stockflow_transactions::Transaction;

    use super::*;
    use crate::product_client::ProductClientError;
    use crate::product_store::ProductStore;
    use crate::reconciliation::{InMemoryReconciliationLog, ReconciliationStatus};
    use crate::test_support::{ScriptedProductClient, purchase, seed_product};

    async fn orphan(
        client: &ScriptedProductClient,
        log: &InMemoryReconciliationLog,
        kind: TransactionType,
        quantity: i64,
    ) -> Transaction {
        let product = seed_product(client.store(), 10).await;
        let mut input = purchase(product.id, quantity);
        input.kind = kind;
        let tx = Transaction::record(stockflow_core::TransactionId::new(), Utc::now(), input).unwrap();
        log.record(ReconciliationEntry::for_transaction(&tx, "unreachable", Utc::now()))
            .await
            .unwrap();
        tx
    }

    #[tokio::test]
    async fn replay_applies_pending_delta_and_resolves() {
        let client = Arc::new(ScriptedProductClient::new());
        let log = Arc::new(InMemoryReconciliationLog::new());
        let tx = orphan(&client, &log, TransactionType::Sale, 4).await;

        let reconciler = Reconciler::new(client.clone(), log.clone());
        let report = reconciler.reconcile_pending().await.unwrap();

        assert_eq!(
            report,
            ReconciliationReport {
                examined: 1,
                resolved: 1,
                still_pending: 0,
                needs_operator: 0,
            }
        );
        assert_eq!(client.store().get(tx.product_id).await.unwrap().unwrap().stock, 6);
        let entry = log.get(tx.id).await.unwrap().unwrap();
        assert_eq!(entry.status, ReconciliationStatus::Resolved);
    }

    #[tokio::test]
    async fn replay_does_not_double_apply_a_delta_that_already_landed() {
        let client = Arc::new(ScriptedProductClient::new());
        let log = Arc::new(InMemoryReconciliationLog::new());
        let tx = orphan(&client, &log, TransactionType::Purchase, 5).await;

        // The workflow's delta reached the store but its response was lost.
        let landed = StockDelta::new(tx.product_id, tx.kind, tx.quantity, IntentToken::from(tx.id)).unwrap();
        client.store().apply_delta(&landed).await.unwrap();

        let reconciler = Reconciler::new(client.clone(), log.clone());
        reconciler.reconcile_pending().await.unwrap();

        assert_eq!(client.store().get(tx.product_id).await.unwrap().unwrap().stock, 15);
        assert!(log.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_replay_stays_pending_with_attempt_counted() {
        let client = Arc::new(ScriptedProductClient::new());
        let log = Arc::new(InMemoryReconciliationLog::new());
        let tx = orphan(&client, &log, TransactionType::Sale, 3).await;
        client.fail_next_apply(ProductClientError::Unreachable("connection refused".into()));

        let reconciler = Reconciler::new(client.clone(), log.clone());
        let report = reconciler.reconcile_pending().await.unwrap();

        assert_eq!(report.still_pending, 1);
        let entry = log.get(tx.id).await.unwrap().unwrap();
        assert_eq!(entry.attempts, 1);
        assert!(entry.last_error.unwrap().contains("connection refused"));
        assert_eq!(client.store().get(tx.product_id).await.unwrap().unwrap().stock, 10);

        // Next pass succeeds.
        let report = reconciler.reconcile_pending().await.unwrap();
        assert_eq!(report.resolved, 1);
        assert_eq!(client.store().get(tx.product_id).await.unwrap().unwrap().stock, 7);
    }

    #[tokio::test]
    async fn permanent_failure_is_escalated_after_one_replay() {
        let client = Arc::new(ScriptedProductClient::new());
        let log = Arc::new(InMemoryReconciliationLog::new());
        let tx = orphan(&client, &log, TransactionType::Sale, 3).await;
        client.store().delete(tx.product_id).await.unwrap();

        let reconciler = Reconciler::new(client.clone(), log.clone());
        let report = reconciler.reconcile_pending().await.unwrap();
        assert_eq!(report.needs_operator, 1);
        assert_eq!(report.still_pending, 0);

        for _ in 0..50 {
            let report = reconciler.reconcile_pending().await.unwrap();
            assert_eq!(report.examined, 0);
        }

        assert_eq!(client.apply_calls(), 1);
        let entry = log.get(tx.id).await.unwrap().unwrap();
        assert_eq!(entry.status, ReconciliationStatus::NeedsOperator);
        assert_eq!(entry.attempts, 1);
        assert_eq!(entry.last_error.as_deref(), Some("product not found"));
        assert_eq!(log.open().await.unwrap().len(), 1);

        let resolved = reconciler
            .resolve_manually(tx.id, "product retired, stock written off")
            .await
            .unwrap();
        assert_eq!(resolved.status, ReconciliationStatus::Resolved);
        assert!(log.open().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn insufficient_stock_on_replay_is_not_retried() {
        let client = Arc::new(ScriptedProductClient::new());
        let log = Arc::new(InMemoryReconciliationLog::new());
        let tx = orphan(&client, &log, TransactionType::Sale, 25).await;

        let reconciler = Reconciler::new(client.clone(), log.clone());
        let report = reconciler.reconcile_pending().await.unwrap();

        assert_eq!(report.needs_operator, 1);
        assert_eq!(log.get(tx.id).await.unwrap().unwrap().status, ReconciliationStatus::NeedsOperator);
        assert_eq!(client.store().get(tx.product_id).await.unwrap().unwrap().stock, 10);
    }

    #[tokio::test]
    async fn transient_failures_stop_after_max_attempts() {
        let client = Arc::new(ScriptedProductClient::new());
        let log = Arc::new(InMemoryReconciliationLog::new());
        let tx = orphan(&client, &log, TransactionType::Purchase, 1).await;
        for _ in 0..5 {
            client.fail_next_apply(ProductClientError::Unreachable("503".into()));
        }

        let reconciler = Reconciler::new(client.clone(), log.clone()).with_max_attempts(3);
        assert_eq!(reconciler.reconcile_pending().await.unwrap().still_pending, 1);
        assert_eq!(reconciler.reconcile_pending().await.unwrap().still_pending, 1);
        assert_eq!(reconciler.reconcile_pending().await.unwrap().needs_operator, 1);
        assert_eq!(reconciler.reconcile_pending().await.unwrap().examined, 0);

        assert_eq!(client.apply_calls(), 3);
        let entry = log.get(tx.id).await.unwrap().unwrap();
        assert_eq!(entry.attempts, 3);
        assert_eq!(entry.status, ReconciliationStatus::NeedsOperator);
        assert_eq!(client.store().get(tx.product_id).await.unwrap().unwrap().stock, 10);
    }

    #[tokio::test]
    async fn manual_resolution_of_unknown_entry_is_not_found() {
        let reconciler = Reconciler::new(
            Arc::new(ScriptedProductClient::new()),
            InMemoryReconciliationLog::new(),
        );
        let id = stockflow_core::TransactionId::new();
        assert_eq!(
            reconciler.resolve_manually(id, "fixed by hand").await.unwrap_err(),
            ReconciliationError::NotFound(id)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_task_runs_until_shut_down() {
        let client = Arc::new(ScriptedProductClient::new());
        let log = Arc::new(InMemoryReconciliationLog::new());
        let tx = orphan(&client, &log, TransactionType::Purchase, 2).await;

        let reconciler = Arc::new(Reconciler::new(client.clone(), log.clone()));
        assert!(reconciler.clone().spawn(Duration::ZERO).is_none());

        let handle = reconciler.spawn(Duration::from_secs(30)).unwrap();
        tokio::time::sleep(Duration::from_secs(31)).await;
        handle.shutdown().await;

        assert_eq!(log.get(tx.id).await.unwrap().unwrap().status, ReconciliationStatus::Resolved);
        assert_eq!(client.store().get(tx.product_id).await.unwrap().unwrap().stock, 12);
    }
}
