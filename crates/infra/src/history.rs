//! Read side of the Transaction service.
//!
//! Queries the transaction store and decorates each record with the
//! product's current name and stock, fetched from the Product service.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use stockflow_core::ProductId;
use stockflow_products::Product;
use stockflow_transactions::{Transaction, TransactionFilter};

use crate::product_client::{ProductClient, ProductClientError};
use crate::transaction_store::{TransactionStore, TransactionStoreError};

/// A transaction as returned to clients, with current product details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionView {
    #[serde(flatten)]
    pub transaction: Transaction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_stock: Option<i64>,
}

impl TransactionView {
    pub fn new(transaction: Transaction, product: Option<&Product>) -> Self {
        Self {
            transaction,
            product_name: product.map(|p| p.name.clone()),
            product_stock: product.map(|p| p.stock),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HistoryError {
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("product service unavailable: {0}")]
    DependencyUnavailable(String),

    #[error(transparent)]
    Store(#[from] TransactionStoreError),
}

pub struct TransactionHistory<C, T> {
    client: C,
    transactions: T,
}

impl<C, T> TransactionHistory<C, T>
where
    C: ProductClient,
    T: TransactionStore,
{
    pub fn new(client: C, transactions: T) -> Self {
        Self {
            client,
            transactions,
        }
    }

    /// All matching transactions, most recent first. Product details are
    /// best effort: a product that cannot be fetched leaves them empty.
    pub async fn list_all(&self, filter: &TransactionFilter) -> Result<Vec<TransactionView>, HistoryError> {
        let records = self.transactions.query(filter).await?;

        let mut products: HashMap<ProductId, Option<Product>> = HashMap::new();
        for tx in &records {
            if products.contains_key(&tx.product_id) {
                continue;
            }
            let product = match self.client.fetch(tx.product_id).await {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!(product_id = %tx.product_id, error = %e, "product details unavailable");
                    None
                }
            };
            products.insert(tx.product_id, product);
        }

        Ok(records
            .into_iter()
            .map(|tx| {
                let product = products.get(&tx.product_id).and_then(Option::as_ref);
                TransactionView::new(tx, product)
            })
            .collect())
    }

    /// Transactions of one product, most recent first. The product must exist.
    pub async fn list_by_product(
        &self,
        product_id: ProductId,
        filter: &TransactionFilter,
    ) -> Result<Vec<TransactionView>, HistoryError> {
        let product = self.client.fetch(product_id).await.map_err(|e| match e {
            ProductClientError::NotFound => HistoryError::ProductNotFound(product_id),
            other => HistoryError::DependencyUnavailable(other.to_string()),
        })?;

        let filter = TransactionFilter {
            product_id: Some(product_id),
            ..filter.clone()
        };
        let records = self.transactions.query(&filter).await?;

        Ok(records
            .into_iter()
            .map(|tx| TransactionView::new(tx, Some(&product)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};
    use stockflow_core::{TransactionId, TransactionType};

    use super::*;
    use crate::product_store::ProductStore;
    use crate::test_support::{ScriptedProductClient, purchase, sale, seed_product};
    use crate::transaction_store::InMemoryTransactionStore;

    struct Fixture {
        client: Arc<ScriptedProductClient>,
        store: Arc<InMemoryTransactionStore>,
        history: TransactionHistory<Arc<ScriptedProductClient>, Arc<InMemoryTransactionStore>>,
    }

    fn fixture() -> Fixture {
        let client = Arc::new(ScriptedProductClient::new());
        let store = Arc::new(InMemoryTransactionStore::new());
        let history = TransactionHistory::new(client.clone(), store.clone());
        Fixture {
            client,
            store,
            history,
        }
    }

    async fn append(store: &InMemoryTransactionStore, input: stockflow_transactions::NewTransaction, day: i64) -> Transaction {
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::days(day);
        let tx = Transaction::record(TransactionId::new(), date, input).unwrap();
        store.append(tx).await.unwrap()
    }

    #[tokio::test]
    async fn list_all_is_most_recent_first_and_enriched() {
        let f = fixture();
        let p = seed_product(f.client.store(), 10).await;
        let old = append(&f.store, purchase(p.id, 1), 0).await;
        let new = append(&f.store, sale(p.id, 2), 3).await;

        let views = f.history.list_all(&TransactionFilter::default()).await.unwrap();
        let ids: Vec<_> = views.iter().map(|v| v.transaction.id).collect();
        assert_eq!(ids, vec![new.id, old.id]);
        assert!(views.iter().all(|v| v.product_name.as_deref() == Some("Widget")));
        assert!(views.iter().all(|v| v.product_stock == Some(10)));
        // One fetch per distinct product.
        assert_eq!(f.client.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn list_all_survives_missing_products() {
        let f = fixture();
        let p = seed_product(f.client.store(), 10).await;
        append(&f.store, purchase(p.id, 1), 0).await;
        f.client.store().delete(p.id).await.unwrap();

        let views = f.history.list_all(&TransactionFilter::default()).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].product_name, None);
    }

    #[tokio::test]
    async fn list_by_product_filters_by_type_and_dates() {
        let f = fixture();
        let p = seed_product(f.client.store(), 10).await;
        let other = seed_product(f.client.store(), 10).await;
        append(&f.store, purchase(p.id, 1), 0).await;
        let wanted = append(&f.store, sale(p.id, 1), 2).await;
        append(&f.store, sale(p.id, 1), 9).await;
        append(&f.store, sale(other.id, 1), 2).await;

        let filter = TransactionFilter {
            kind: Some(TransactionType::Sale),
            start_date: Some(wanted.date),
            end_date: Some(wanted.date + Duration::days(1)),
            ..Default::default()
        };
        let views = f.history.list_by_product(p.id, &filter).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].transaction.id, wanted.id);
    }

    #[tokio::test]
    async fn list_by_unknown_product_is_not_found() {
        let f = fixture();
        let id = ProductId::new();
        assert_eq!(
            f.history.list_by_product(id, &TransactionFilter::default()).await.unwrap_err(),
            HistoryError::ProductNotFound(id)
        );
    }

    #[tokio::test]
    async fn list_by_product_reports_unreachable_product_service() {
        let f = fixture();
        let p = seed_product(f.client.store(), 1).await;
        f.client
            .fail_next_fetch(ProductClientError::Unreachable("refused".to_string()));
        assert!(matches!(
            f.history.list_by_product(p.id, &TransactionFilter::default()).await.unwrap_err(),
            HistoryError::DependencyUnavailable(_)
        ));
    }

    #[test]
    fn view_serializes_flat() {
        let tx = Transaction::record(TransactionId::new(), Utc::now(), purchase(ProductId::new(), 2)).unwrap();
        let json = serde_json::to_value(TransactionView::new(tx, None)).unwrap();
        assert_eq!(json["type"], "purchase");
        assert_eq!(json["total_price"], "5.00");
        assert!(json.get("product_name").is_none());
    }
}
