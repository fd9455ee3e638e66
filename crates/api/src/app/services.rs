//! Per-service wiring of stores, clients and the mutation workflow.
//!
//! Backends are picked at startup: Postgres when `DATABASE_URL` is set,
//! in-memory otherwise. Handlers only ever see the trait objects below.

use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use stockflow_infra::config::ServiceConfig;
use stockflow_infra::coordinator::{CoordinatorConfig, InventoryMutationCoordinator};
use stockflow_infra::history::TransactionHistory;
use stockflow_infra::product_client::{HttpProductClient, ProductClient};
use stockflow_infra::product_store::{InMemoryProductStore, PostgresProductStore, ProductStore};
use stockflow_infra::reconciliation::{
    DEFAULT_MAX_ATTEMPTS, InMemoryReconciliationLog, PostgresReconciliationLog, ReconciliationLog,
    Reconciler,
};
use stockflow_infra::transaction_store::{
    InMemoryTransactionStore, PostgresTransactionStore, TransactionStore,
};

pub type DynProductStore = Arc<dyn ProductStore>;
pub type DynProductClient = Arc<dyn ProductClient>;
pub type DynTransactionStore = Arc<dyn TransactionStore>;
pub type DynReconciliationLog = Arc<dyn ReconciliationLog>;

pub type Coordinator =
    InventoryMutationCoordinator<DynProductClient, DynTransactionStore, DynReconciliationLog>;
pub type History = TransactionHistory<DynProductClient, DynTransactionStore>;
pub type StockReconciler = Reconciler<DynProductClient, DynReconciliationLog>;

#[derive(Clone)]
pub struct ProductServices {
    pub store: DynProductStore,
}

impl ProductServices {
    pub fn new(store: DynProductStore) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryProductStore::new()))
    }

    pub async fn from_config(config: &ServiceConfig) -> anyhow::Result<Self> {
        match &config.database_url {
            Some(url) => {
                let pool = connect(url).await?;
                stockflow_infra::migrate(&pool, stockflow_infra::PRODUCT_MIGRATIONS)
                    .await
                    .context("failed to run product migrations")?;
                tracing::info!("product store: postgres");
                Ok(Self::new(Arc::new(PostgresProductStore::new(pool))))
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory product store");
                Ok(Self::in_memory())
            }
        }
    }
}

#[derive(Clone)]
pub struct TransactionServices {
    pub coordinator: Arc<Coordinator>,
    pub history: Arc<History>,
    pub reconciler: Arc<StockReconciler>,
}

impl TransactionServices {
    pub fn new(
        client: DynProductClient,
        transactions: DynTransactionStore,
        reconciliation: DynReconciliationLog,
        config: CoordinatorConfig,
        reconcile_max_attempts: u32,
    ) -> Self {
        Self {
            coordinator: Arc::new(InventoryMutationCoordinator::new(
                client.clone(),
                transactions.clone(),
                reconciliation.clone(),
                config,
            )),
            history: Arc::new(TransactionHistory::new(client.clone(), transactions)),
            reconciler: Arc::new(
                Reconciler::new(client, reconciliation).with_max_attempts(reconcile_max_attempts),
            ),
        }
    }

    pub fn in_memory(client: DynProductClient, config: CoordinatorConfig) -> Self {
        Self::new(
            client,
            Arc::new(InMemoryTransactionStore::new()),
            Arc::new(InMemoryReconciliationLog::new()),
            config,
            DEFAULT_MAX_ATTEMPTS,
        )
    }

    pub async fn from_config(config: &ServiceConfig) -> anyhow::Result<Self> {
        let client = HttpProductClient::new(&config.product_service_url, config.product_client_timeout)
            .context("failed to build product service client")?;
        let client: DynProductClient = Arc::new(client);
        tracing::info!(product_service_url = %config.product_service_url, "product client configured");

        match &config.database_url {
            Some(url) => {
                let pool = connect(url).await?;
                stockflow_infra::migrate(&pool, stockflow_infra::TRANSACTION_MIGRATIONS)
                    .await
                    .context("failed to run transaction migrations")?;
                tracing::info!("transaction store: postgres");
                Ok(Self::new(
                    client,
                    Arc::new(PostgresTransactionStore::new(pool.clone())),
                    Arc::new(PostgresReconciliationLog::new(pool)),
                    config.coordinator(),
                    config.reconcile_max_attempts,
                ))
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory transaction store");
                Ok(Self::new(
                    client,
                    Arc::new(InMemoryTransactionStore::new()),
                    Arc::new(InMemoryReconciliationLog::new()),
                    config.coordinator(),
                    config.reconcile_max_attempts,
                ))
            }
        }
    }
}

async fn connect(url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to postgres")
}
