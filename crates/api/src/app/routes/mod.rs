pub mod products;
pub mod reconciliation;
pub mod system;
pub mod transactions;
