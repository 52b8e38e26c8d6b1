//! Cleaner Task
//!
//! Background task that periodically moves aged entries out of memory.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::cache::Shared;
use crate::error::{CacheError, Result};

/// Handle to a running cleaner task.
///
/// The task stops when [`Cleaner::stop`] is called or when the handle is
/// dropped, since dropping closes the shutdown channel.
#[derive(Debug)]
pub struct Cleaner {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Cleaner {
    /// Spawns the cleaner on the current Tokio runtime.
    ///
    /// The first scan runs one `scan_interval` after spawning; a scan that
    /// overruns delays the next one rather than bursting to catch up.
    ///
    /// # Errors
    /// `InvalidConfiguration` when called outside a Tokio runtime.
    pub(crate) fn spawn(shared: Arc<Shared>, scan_interval: Duration) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            CacheError::InvalidConfiguration(format!("the cleaner needs a Tokio runtime: {e}"))
        })?;
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = runtime.spawn(async move {
            if shared.log_enabled() {
                info!(
                    scan_interval_ms = interval_ms(scan_interval),
                    "Starting cache cleaner"
                );
            }

            let mut ticker = tokio::time::interval(scan_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        shared.evict_expired().await;
                    }
                    changed = shutdown_rx.changed() => {
                        // Err means every sender is gone: the store was dropped
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            if shared.log_enabled() {
                info!("Cache cleaner stopped");
            }
        });

        Ok(Self { shutdown, handle })
    }

    /// Signals the task to stop and waits for it to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            if e.is_panic() {
                warn!(error = %e, "Cache cleaner panicked");
            }
        }
    }

    /// Returns true once the task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Milliseconds for logging, saturating instead of wrapping.
fn interval_ms(interval: Duration) -> u64 {
    u64::try_from(interval.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::PersistentStore;
    use serde_json::json;
    use tempfile::TempDir;

    fn shared_with(retention: Duration, persistent: Option<PersistentStore>) -> Arc<Shared> {
        Arc::new(Shared::new(retention, persistent, false))
    }

    #[tokio::test]
    async fn test_cleaner_evicts_expired_entries() {
        let dir = TempDir::new().unwrap();
        let persistent = PersistentStore::new(dir.path().join("data"), false);
        let shared = shared_with(Duration::from_millis(100), Some(persistent.clone()));
        shared.add("expire_soon".to_string(), json!("value")).await;

        let cleaner = Cleaner::spawn(shared.clone(), Duration::from_millis(50)).unwrap();

        // Wait for the entry to age out and a scan to run
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(shared.len().await, 0, "Expired entry should have left memory");
        assert_eq!(persistent.read("expire_soon").await, Some(json!("value")));

        cleaner.stop().await;
    }

    #[tokio::test]
    async fn test_cleaner_preserves_young_entries() {
        let shared = shared_with(Duration::from_secs(3600), None);
        shared.add("long_lived".to_string(), json!("value")).await;

        let cleaner = Cleaner::spawn(shared.clone(), Duration::from_millis(50)).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(shared.get("long_lived").await.unwrap(), json!("value"));

        cleaner.stop().await;
    }

    #[tokio::test]
    async fn test_cleaner_can_be_stopped() {
        let shared = shared_with(Duration::from_secs(1), None);
        let cleaner = Cleaner::spawn(shared, Duration::from_secs(1)).unwrap();

        assert!(!cleaner.is_finished());
        tokio::time::timeout(Duration::from_secs(1), cleaner.stop())
            .await
            .expect("stop should not wait for the next tick");
    }

    #[tokio::test]
    async fn test_cleaner_exits_when_handle_dropped() {
        let shared = shared_with(Duration::from_secs(1), None);
        let cleaner = Cleaner::spawn(shared.clone(), Duration::from_secs(1)).unwrap();
        drop(cleaner);

        // the task owned the only other reference
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(Arc::strong_count(&shared), 1, "Task should have released the store");
    }

    #[test]
    fn test_interval_ms_saturates() {
        assert_eq!(interval_ms(Duration::from_millis(1500)), 1500);
        assert_eq!(interval_ms(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_spawn_outside_runtime_fails() {
        let shared = shared_with(Duration::from_secs(1), None);
        let result = Cleaner::spawn(shared, Duration::from_secs(1));
        assert!(matches!(result, Err(CacheError::InvalidConfiguration(_))));
    }
}
