use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use stockflow_core::{IntentToken, ProductId};
use stockflow_products::{NewProduct, Product, ProductUpdate, StockDelta};

use super::{ProductStore, ProductStoreError, StockOutcome};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct AppliedIntent {
    product_id: ProductId,
    delta: i64,
    applied_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    products: HashMap<ProductId, Product>,
    intents: HashMap<IntentToken, AppliedIntent>,
}

/// In-memory product store.
///
/// Intended for tests/dev. Products and applied intent tokens live behind a
/// single lock, so check-and-mutate plus token registration is one atomic step.
#[derive(Debug, Default)]
pub struct InMemoryProductStore {
    state: RwLock<State>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a fully-formed product (tests/dev fixtures).
    pub fn insert(&self, product: Product) -> Result<(), ProductStoreError> {
        let mut state = self.write()?;
        state.products.insert(product.id, product);
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, ProductStoreError> {
        self.state
            .read()
            .map_err(|_| ProductStoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, ProductStoreError> {
        self.state
            .write()
            .map_err(|_| ProductStoreError::Backend("lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl ProductStore for InMemoryProductStore {
    async fn list(&self) -> Result<Vec<Product>, ProductStoreError> {
        let state = self.read()?;
        let mut products: Vec<Product> = state.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(products)
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>, ProductStoreError> {
        Ok(self.read()?.products.get(&id).cloned())
    }

    async fn create(&self, input: NewProduct) -> Result<Product, ProductStoreError> {
        let product = Product::create(ProductId::new(), input, Utc::now())?;
        self.write()?.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update(&self, id: ProductId, input: ProductUpdate) -> Result<Product, ProductStoreError> {
        let mut state = self.write()?;
        let product = state.products.get_mut(&id).ok_or(ProductStoreError::NotFound)?;
        product.update(input, Utc::now())?;
        Ok(product.clone())
    }

    async fn delete(&self, id: ProductId) -> Result<bool, ProductStoreError> {
        let mut state = self.write()?;
        let removed = state.products.remove(&id).is_some();
        if removed {
            state.intents.retain(|_, intent| intent.product_id != id);
        }
        Ok(removed)
    }

    async fn apply_delta(&self, delta: &StockDelta) -> Result<StockOutcome, ProductStoreError> {
        let mut state = self.write()?;
        let State { products, intents } = &mut *state;

        let product = products
            .get_mut(&delta.product_id)
            .ok_or(ProductStoreError::NotFound)?;

        if let Some(previous) = intents.get(&delta.intent_token) {
            if previous.product_id != delta.product_id || previous.delta != delta.signed() {
                return Err(ProductStoreError::TokenConflict(format!(
                    "token {} was applied as {:+} to product {}",
                    delta.intent_token, previous.delta, previous.product_id
                )));
            }
            tracing::debug!(
                intent_token = %delta.intent_token,
                product_id = %delta.product_id,
                "replayed stock intent ignored"
            );
            return Ok(StockOutcome::AlreadyApplied {
                stock: product.stock,
            });
        }

        // Rejections leave no trace, so the same token may be retried later.
        let now = Utc::now();
        let stock = product.move_stock(delta.kind, delta.quantity, now)?;
        intents.insert(
            delta.intent_token,
            AppliedIntent {
                product_id: delta.product_id,
                delta: delta.signed(),
                applied_at: now,
            },
        );

        Ok(StockOutcome::Applied { stock })
    }

    async fn prune_intents(&self, cutoff: DateTime<Utc>) -> Result<u64, ProductStoreError> {
        let mut state = self.write()?;
        let before = state.intents.len();
        state.intents.retain(|_, intent| intent.applied_at >= cutoff);
        Ok((before - state.intents.len()) as u64)
    }
}
