//! The Transaction service's view of the Product service.
//!
//! `ProductClient` is a capability interface (`fetch`, `apply_delta`) with a
//! fixed failure taxonomy, so the coordinator does not care whether the
//! product store sits behind HTTP or in the same process.
//!
//! | Error | Retry? |
//! |---|---|
//! | `Unreachable` (network, timeout, 5xx) | yes, bounded |
//! | `NotFound`, `InsufficientStock`, `Rejected`, `InvalidResponse` | no |

pub mod http;
pub mod in_process;

pub use http::HttpProductClient;
pub use in_process::InProcessProductClient;

use std::sync::Arc;

use thiserror::Error;

use stockflow_core::ProductId;
use stockflow_products::{Product, StockDelta};

use crate::retry::Transient;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProductClientError {
    #[error("product not found")]
    NotFound,

    #[error("insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("product service unreachable: {0}")]
    Unreachable(String),

    #[error("product service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid response from product service: {0}")]
    InvalidResponse(String),
}

impl Transient for ProductClientError {
    fn is_transient(&self) -> bool {
        matches!(self, ProductClientError::Unreachable(_))
    }
}

#[async_trait::async_trait]
pub trait ProductClient: Send + Sync {
    async fn fetch(&self, product_id: ProductId) -> Result<Product, ProductClientError>;

    /// Ask the product store to apply `delta`; safe to re-send with the same token.
    async fn apply_delta(&self, delta: &StockDelta) -> Result<(), ProductClientError>;
}

#[async_trait::async_trait]
impl<C> ProductClient for Arc<C>
where
    C: ProductClient + ?Sized,
{
    async fn fetch(&self, product_id: ProductId) -> Result<Product, ProductClientError> {
        (**self).fetch(product_id).await
    }

    async fn apply_delta(&self, delta: &StockDelta) -> Result<(), ProductClientError> {
        (**self).apply_delta(delta).await
    }
}
