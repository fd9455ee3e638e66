//! Shared domain building blocks for the stockflow services.
//!
//! This crate contains **pure domain** primitives used by both the Product and
//! the Transaction service (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod kind;
pub mod money;
pub mod value_object;

pub use error::{DomainError, DomainResult};
pub use id::{IntentToken, ProductId, TransactionId};
pub use kind::TransactionType;
pub use money::Money;
pub use value_object::ValueObject;
