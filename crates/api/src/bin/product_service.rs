use std::sync::Arc;

use anyhow::Context;

use stockflow_api::app::{self, ProductServices};
use stockflow_infra::config::ServiceConfig;
use stockflow_infra::product_store::spawn_intent_pruner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockflow_observability::init("product-service");

    let config = ServiceConfig::from_env()?;
    let services = Arc::new(ProductServices::from_config(&config).await?);
    let pruner = spawn_intent_pruner(services.store.clone(), config.intent_retention);
    let app = app::build_product_app(services);

    let listener = tokio::net::TcpListener::bind(config.product_bind)
        .await
        .with_context(|| format!("failed to bind {}", config.product_bind))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = pruner {
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
