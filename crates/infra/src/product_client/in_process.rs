use stockflow_core::ProductId;
use stockflow_products::{Product, StockDelta};

use super::{ProductClient, ProductClientError};
use crate::product_store::{ProductStore, ProductStoreError, StockOutcome};

/// Product client that calls a `ProductStore` directly (single-process dev
/// wiring and tests). Store failures are mapped onto the same taxonomy the
/// HTTP client produces.
#[derive(Debug, Clone)]
pub struct InProcessProductClient<S> {
    store: S,
}

impl<S> InProcessProductClient<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

fn map_store_error(err: ProductStoreError) -> ProductClientError {
    match err {
        ProductStoreError::NotFound => ProductClientError::NotFound,
        e @ ProductStoreError::InsufficientStock { .. } => {
            ProductClientError::InsufficientStock(e.to_string())
        }
        e @ (ProductStoreError::Validation(_) | ProductStoreError::TokenConflict(_)) => {
            ProductClientError::Rejected {
                status: 422,
                message: e.to_string(),
            }
        }
        ProductStoreError::Backend(msg) => ProductClientError::Unreachable(msg),
    }
}

#[async_trait::async_trait]
impl<S> ProductClient for InProcessProductClient<S>
where
    S: ProductStore,
{
    async fn fetch(&self, product_id: ProductId) -> Result<Product, ProductClientError> {
        self.store
            .get(product_id)
            .await
            .map_err(map_store_error)?
            .ok_or(ProductClientError::NotFound)
    }

    async fn apply_delta(&self, delta: &StockDelta) -> Result<(), ProductClientError> {
        match self.store.apply_delta(delta).await.map_err(map_store_error)? {
            StockOutcome::Applied { .. } | StockOutcome::AlreadyApplied { .. } => Ok(()),
        }
    }
}
