//! Transactions domain module.
//!
//! Purchase/sale records as kept by the Transaction service: immutable once
//! recorded, with a total that is always recomputed from quantity and unit
//! price. Also holds the read-side filter and ordering rules. Pure logic only.

pub mod query;
pub mod transaction;

pub use query::{TransactionFilter, most_recent_first, sort_most_recent_first};
pub use transaction::{NewTransaction, Transaction};
