use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use stockflow_core::TransactionId;

use super::{ReconciliationEntry, ReconciliationError, ReconciliationLog, ReconciliationStatus};

/// In-memory reconciliation log (tests/dev).
#[derive(Debug, Default)]
pub struct InMemoryReconciliationLog {
    entries: RwLock<HashMap<TransactionId, ReconciliationEntry>>,
}

impl InMemoryReconciliationLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned<T>(_: T) -> ReconciliationError {
        ReconciliationError::Backend("lock poisoned".to_string())
    }

    fn update<F>(&self, id: TransactionId, f: F) -> Result<ReconciliationEntry, ReconciliationError>
    where
        F: FnOnce(&mut ReconciliationEntry),
    {
        let mut entries = self.entries.write().map_err(Self::poisoned)?;
        let entry = entries.get_mut(&id).ok_or(ReconciliationError::NotFound(id))?;
        f(entry);
        Ok(entry.clone())
    }

    fn select(
        &self,
        keep: fn(&ReconciliationEntry) -> bool,
    ) -> Result<Vec<ReconciliationEntry>, ReconciliationError> {
        let entries = self.entries.read().map_err(Self::poisoned)?;
        let mut selected: Vec<ReconciliationEntry> = entries.values().filter(|e| keep(e)).cloned().collect();
        selected.sort_by(|a, b| {
            a.detected_at
                .cmp(&b.detected_at)
                .then_with(|| a.transaction_id.cmp(&b.transaction_id))
        });
        Ok(selected)
    }
}

#[async_trait::async_trait]
impl ReconciliationLog for InMemoryReconciliationLog {
    async fn record(&self, entry: ReconciliationEntry) -> Result<ReconciliationEntry, ReconciliationError> {
        let mut entries = self.entries.write().map_err(Self::poisoned)?;
        Ok(entries.entry(entry.transaction_id).or_insert(entry).clone())
    }

    async fn pending(&self) -> Result<Vec<ReconciliationEntry>, ReconciliationError> {
        self.select(ReconciliationEntry::is_pending)
    }

    async fn open(&self) -> Result<Vec<ReconciliationEntry>, ReconciliationError> {
        self.select(ReconciliationEntry::is_open)
    }

    async fn get(&self, id: TransactionId) -> Result<Option<ReconciliationEntry>, ReconciliationError> {
        Ok(self.entries.read().map_err(Self::poisoned)?.get(&id).cloned())
    }

    async fn mark_attempt(
        &self,
        id: TransactionId,
        error: &str,
        escalate: bool,
    ) -> Result<ReconciliationEntry, ReconciliationError> {
        self.update(id, |entry| {
            entry.attempts = entry.attempts.saturating_add(1);
            entry.last_error = Some(error.to_string());
            if escalate && entry.is_pending() {
                entry.status = ReconciliationStatus::NeedsOperator;
            }
        })
    }

    async fn resolve(&self, id: TransactionId, note: &str) -> Result<ReconciliationEntry, ReconciliationError> {
        self.update(id, |entry| {
            if entry.is_open() {
                entry.status = ReconciliationStatus::Resolved;
                entry.resolved_at = Some(Utc::now());
                entry.resolution_note = Some(note.to_string());
            }
        })
    }
}
