//! Fakes shared by the infra unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use rust_decimal_macros::dec;

use stockflow_core::{Money, ProductId, TransactionType};
use stockflow_products::{NewProduct, Product, StockDelta};
use stockflow_transactions::NewTransaction;

use crate::product_client::{InProcessProductClient, ProductClient, ProductClientError};
use crate::product_store::InMemoryProductStore;

/// What the next `apply_delta` call should do instead of a plain pass-through.
#[derive(Debug, Clone)]
enum ApplyStep {
    /// Fail without reaching the store.
    Fail(ProductClientError),
    /// Reach the store, then lose the response.
    ApplyThenFail(ProductClientError),
}

/// `ProductClient` backed by an in-memory store, with scripted failures,
/// delays and call counters.
#[derive(Debug)]
pub struct ScriptedProductClient {
    inner: InProcessProductClient<Arc<InMemoryProductStore>>,
    /// `None` passes the call through.
    fetch_steps: Mutex<VecDeque<Option<ProductClientError>>>,
    apply_steps: Mutex<VecDeque<ApplyStep>>,
    apply_delay: Mutex<Option<Duration>>,
    fetch_calls: AtomicUsize,
    apply_calls: AtomicUsize,
}

impl ScriptedProductClient {
    pub fn new() -> Self {
        Self {
            inner: InProcessProductClient::new(Arc::new(InMemoryProductStore::new())),
            fetch_steps: Mutex::default(),
            apply_steps: Mutex::default(),
            apply_delay: Mutex::default(),
            fetch_calls: AtomicUsize::new(0),
            apply_calls: AtomicUsize::new(0),
        }
    }

    pub fn store(&self) -> &Arc<InMemoryProductStore> {
        self.inner.store()
    }

    pub fn fail_next_fetch(&self, err: ProductClientError) {
        self.fetch_steps.lock().unwrap().push_back(Some(err));
    }

    /// Let the next scripted fetch through (to fail a later one).
    pub fn pass_next_fetch(&self) {
        self.fetch_steps.lock().unwrap().push_back(None);
    }

    pub fn fail_next_apply(&self, err: ProductClientError) {
        self.apply_steps.lock().unwrap().push_back(ApplyStep::Fail(err));
    }

    pub fn lose_next_apply_response(&self) {
        self.apply_steps
            .lock()
            .unwrap()
            .push_back(ApplyStep::ApplyThenFail(ProductClientError::Unreachable(
                "response lost".to_string(),
            )));
    }

    /// Sleep this long before every `apply_delta`.
    pub fn delay_apply(&self, delay: Duration) {
        *self.apply_delay.lock().unwrap() = Some(delay);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn apply_calls(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ProductClient for ScriptedProductClient {
    async fn fetch(&self, product_id: ProductId) -> Result<Product, ProductClientError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.fetch_steps.lock().unwrap().pop_front().flatten();
        match scripted {
            Some(err) => Err(err),
            None => self.inner.fetch(product_id).await,
        }
    }

    async fn apply_delta(&self, delta: &StockDelta) -> Result<(), ProductClientError> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.apply_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let step = self.apply_steps.lock().unwrap().pop_front();
        match step {
            Some(ApplyStep::Fail(err)) => Err(err),
            Some(ApplyStep::ApplyThenFail(err)) => {
                self.inner.apply_delta(delta).await?;
                Err(err)
            }
            None => self.inner.apply_delta(delta).await,
        }
    }
}

pub async fn seed_product(store: &InMemoryProductStore, stock: i64) -> Product {
    let product = Product::create(
        ProductId::new(),
        NewProduct {
            name: "Widget".to_string(),
            category: "Hardware".to_string(),
            description: Some("test fixture".to_string()),
            price: Money::new(dec!(4.00)).unwrap(),
            stock,
        },
        Utc::now(),
    )
    .unwrap();
    store.insert(product.clone()).unwrap();
    product
}

pub fn purchase(product_id: ProductId, quantity: i64) -> NewTransaction {
    NewTransaction {
        kind: TransactionType::Purchase,
        product_id,
        quantity,
        unit_price: Money::new(dec!(2.50)).unwrap(),
        details: None,
    }
}

pub fn sale(product_id: ProductId, quantity: i64) -> NewTransaction {
    NewTransaction {
        kind: TransactionType::Sale,
        ..purchase(product_id, quantity)
    }
}
