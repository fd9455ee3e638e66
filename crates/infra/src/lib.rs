//! Infrastructure layer: stores, the remote product client, and the
//! cross-service stock mutation workflow built on top of them.

pub mod config;
pub mod coordinator;
pub mod history;
pub mod periodic;
pub mod product_client;
pub mod product_store;
pub mod reconciliation;
pub mod retry;
pub mod transaction_store;

#[cfg(test)]
pub(crate) mod test_support;

/// SQL migrations for the Product service's Postgres adapter.
pub const PRODUCT_MIGRATIONS: &[&str] = &[include_str!("../migrations/0001_products.sql")];

/// SQL migrations for the Transaction service's Postgres adapters.
pub const TRANSACTION_MIGRATIONS: &[&str] = &[include_str!("../migrations/0001_transactions.sql")];

/// Apply migrations in order. Every statement is idempotent (`IF NOT EXISTS`).
pub async fn migrate(pool: &sqlx::PgPool, migrations: &[&str]) -> Result<(), sqlx::Error> {
    for migration in migrations {
        sqlx::raw_sql(migration).execute(pool).await?;
    }
    Ok(())
}
