//! Periodic background sync.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::Synchronizer;

/// Run [`Synchronizer::auto_sync`] every `period` until the task is aborted.
///
/// The first pass happens one full period after spawning.
pub fn spawn_auto_sync(sync: Arc<Synchronizer>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(period_secs = period.as_secs(), "Auto sync started");

        loop {
            ticker.tick().await;
            match sync.auto_sync().await {
                Some(result) if !result.success => {
                    tracing::warn!(errors = ?result.errors, "Auto sync finished with errors");
                }
                Some(result) => {
                    tracing::debug!(synced = result.synced_operations, "Auto sync finished");
                }
                None => {}
            }
        }
    })
}
