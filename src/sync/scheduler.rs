//! Periodic sync loop
//!
//! Optional background task driving the coordinator on a fixed interval.
//! Manual `sync()` calls keep working while it runs; when one is in flight
//! the tick is skipped instead of queued.

use super::coordinator::SyncCoordinator;
use crate::error::EngineError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Handle to the background sync loop
pub struct SyncScheduler {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl SyncScheduler {
    /// Spawn the loop. The first tick fires immediately, so starting the
    /// scheduler also runs an initial reconciliation.
    pub fn start(coordinator: Arc<SyncCoordinator>, interval: Duration) -> Self {
        let (shutdown, mut rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match coordinator.sync().await {
                            Ok(true) => debug!("auto sync completed"),
                            Ok(false) => warn!("auto sync: backend unreachable, will retry"),
                            Err(EngineError::SyncInFlight) => {
                                debug!("auto sync tick skipped: pass already in flight")
                            }
                            Err(e) => warn!("auto sync failed: {e}"),
                        }
                    }
                    _ = rx.changed() => break,
                }
            }
            debug!("auto sync loop stopped");
        });
        Self { handle, shutdown }
    }

    /// Stop the loop and wait for it to finish
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::database::Database;
    use crate::store::records::WorkspaceRecord;
    use crate::sync::mock::MockRemoteBackend;

    #[tokio::test]
    async fn test_scheduler_runs_initial_sync_and_stops() {
        let db = Arc::new(Database::open());
        db.workspaces()
            .create(|meta| WorkspaceRecord {
                meta,
                name: "W1".to_string(),
                description: None,
            })
            .await
            .unwrap();

        let backend = Arc::new(MockRemoteBackend::new());
        let coordinator = Arc::new(SyncCoordinator::new(db.clone(), backend.clone()));

        let scheduler = SyncScheduler::start(coordinator.clone(), Duration::from_secs(3600));
        // First tick fires immediately; give it a moment to run
        tokio::time::sleep(Duration::from_millis(200)).await;
        scheduler.stop().await;

        assert!(coordinator.last_sync_timestamp() > 0);
        assert_eq!(backend.workspaces.read().await.len(), 1);
    }
}
