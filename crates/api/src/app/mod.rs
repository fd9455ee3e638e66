//! HTTP application wiring (Axum routers + service wiring).
//!
//! - `services.rs`: store/client/coordinator wiring per service
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and query parsing
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{ProductServices, TransactionServices};

/// Router of the Product service.
pub fn build_product_app(services: Arc<ProductServices>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/products", routes::products::router())
        .layer(ServiceBuilder::new().layer(Extension(services)))
}

/// Router of the Transaction service.
pub fn build_transaction_app(services: Arc<TransactionServices>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/transactions", routes::transactions::router())
        .nest("/reconciliation", routes::reconciliation::router())
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
