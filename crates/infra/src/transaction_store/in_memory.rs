use std::collections::HashSet;
use std::sync::RwLock;

use stockflow_core::TransactionId;
use stockflow_transactions::{Transaction, TransactionFilter};

use super::{TransactionStore, TransactionStoreError};

#[derive(Debug, Default)]
struct Log {
    ids: HashSet<TransactionId>,
    records: Vec<Transaction>,
}

/// In-memory append-only transaction log.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryTransactionStore {
    log: RwLock<Log>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records appended so far.
    pub fn len(&self) -> usize {
        self.log.read().map(|l| l.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn append(&self, transaction: Transaction) -> Result<Transaction, TransactionStoreError> {
        let mut log = self
            .log
            .write()
            .map_err(|_| TransactionStoreError::Backend("lock poisoned".to_string()))?;

        if !log.ids.insert(transaction.id) {
            return Err(TransactionStoreError::Duplicate(transaction.id));
        }
        log.records.push(transaction.clone());
        Ok(transaction)
    }

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>, TransactionStoreError> {
        let log = self
            .log
            .read()
            .map_err(|_| TransactionStoreError::Backend("lock poisoned".to_string()))?;
        Ok(log.records.iter().find(|t| t.id == id).cloned())
    }

    async fn query(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, TransactionStoreError> {
        let log = self
            .log
            .read()
            .map_err(|_| TransactionStoreError::Backend("lock poisoned".to_string()))?;
        Ok(filter.apply(&log.records))
    }
}
