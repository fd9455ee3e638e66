//! Products domain module.
//!
//! Business rules for the product catalog and its stock level, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod product;
pub mod stock;

pub use product::{NewProduct, Product, ProductUpdate};
pub use stock::StockDelta;
