//! Background tasks that run on a fixed interval until shut down.

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::info;

/// Handle for a task started with [`spawn_periodic`].
#[derive(Debug)]
pub struct PeriodicHandle {
    task: &'static str,
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl PeriodicHandle {
    pub fn task(&self) -> &'static str {
        self.task
    }

    /// Stop the task and wait for the run in flight to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.join.await;
    }
}

/// Call `run` every `interval`, first after one full interval. A zero interval
/// disables the task and returns `None`.
///
/// `run` must handle its own errors; a slow run delays the next tick instead
/// of bunching missed ones.
pub fn spawn_periodic<F, Fut>(task: &'static str, interval: Duration, mut run: F) -> Option<PeriodicHandle>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    if interval.is_zero() {
        info!(task, "periodic task disabled");
        return None;
    }

    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
    let join = tokio::spawn(async move {
        info!(task, interval_ms = interval.as_millis() as u64, "periodic task started");
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = ticker.tick() => run().await,
            }
        }
        info!(task, "periodic task stopped");
    });

    Some(PeriodicHandle {
        task,
        shutdown: Some(shutdown_tx),
        join,
    })
}
