//! Pruning of applied intent tokens.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use super::{ProductStore, ProductStoreError};
use crate::periodic::{PeriodicHandle, spawn_periodic};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentRetention {
    /// How long an applied token keeps deduplicating replays.
    pub window: Duration,
    /// How often expired tokens are removed. Zero disables pruning.
    pub interval: Duration,
}

impl Default for IntentRetention {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(7 * 24 * 60 * 60),
            interval: Duration::from_secs(60 * 60),
        }
    }
}

impl IntentRetention {
    /// Tokens applied before this instant are expired.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ProductStoreError> {
        chrono::Duration::from_std(self.window)
            .ok()
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or_else(|| ProductStoreError::Validation("intent retention window out of range".to_string()))
    }
}

/// Remove tokens older than the retention window.
#[instrument(skip(store), fields(window_secs = retention.window.as_secs()), err(Display))]
pub async fn prune_expired<S>(store: &S, retention: &IntentRetention) -> Result<u64, ProductStoreError>
where
    S: ProductStore + ?Sized,
{
    let cutoff = retention.cutoff(Utc::now())?;
    let removed = store.prune_intents(cutoff).await?;
    if removed > 0 {
        info!(removed, %cutoff, "expired stock intents pruned");
    }
    Ok(removed)
}

/// Prune expired tokens every `retention.interval`.
pub fn spawn_intent_pruner<S>(store: S, retention: IntentRetention) -> Option<PeriodicHandle>
where
    S: ProductStore + Clone + 'static,
{
    spawn_periodic("intent_pruner", retention.interval, move || {
        let store = store.clone();
        async move {
            if let Err(e) = prune_expired(&store, &retention).await {
                warn!(error = %e, "stock intent pruning failed");
            }
        }
    })
}
