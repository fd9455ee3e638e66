use std::sync::Arc;

use anyhow::Context;

use stockflow_api::app::{self, TransactionServices};
use stockflow_infra::config::ServiceConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockflow_observability::init("transaction-service");

    let config = ServiceConfig::from_env()?;
    let services = Arc::new(TransactionServices::from_config(&config).await?);
    let reconciler = services.reconciler.clone().spawn(config.reconcile_interval);
    let app = app::build_transaction_app(services);

    let listener = tokio::net::TcpListener::bind(config.transaction_bind)
        .await
        .with_context(|| format!("failed to bind {}", config.transaction_bind))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = reconciler {
        handle.shutdown().await;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
