//! Cache Store Module
//!
//! Main cache engine: a locked in-memory map backed by an optional on-disk
//! tier, with a background cleaner demoting entries older than the retention
//! window.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::stats::StatsRecorder;
use crate::cache::{CacheEntry, CacheStats, PersistentStore};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::tasks::Cleaner;

// == Locked State ==
#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, CacheEntry>,
    /// Keys a scan is currently writing to disk; `true` once deleted mid-demotion
    demoting: HashMap<String, bool>,
    /// Deletes whose file removal has not finished yet, counted per key
    removing: HashMap<String, usize>,
    next_generation: u64,
    /// Bumped whenever a scan commit or a delete changes the disk tier
    disk_epoch: u64,
}

impl State {
    fn insert(&mut self, key: String, value: Value) {
        self.next_generation += 1;
        let entry = CacheEntry::new(value, self.next_generation);
        self.entries.insert(key, entry);
    }

    /// True when `key` was deleted but a file for it may still be on disk.
    fn is_deleted_on_disk(&self, key: &str) -> bool {
        self.removing.contains_key(key) || self.demoting.get(key).copied().unwrap_or(false)
    }
}

/// A value being moved out of memory by a scan.
struct Demotion {
    key: String,
    generation: u64,
    value: Value,
}

// == Shared Engine ==
/// Engine state shared between the store handle and the cleaner task.
#[derive(Debug)]
pub(crate) struct Shared {
    state: RwLock<State>,
    persistent: Option<PersistentStore>,
    retention: Duration,
    log_enabled: bool,
    stats: StatsRecorder,
    /// Serializes scans so a manual scan never races the cleaner
    scan_lock: Mutex<()>,
}

impl Shared {
    pub(crate) fn new(
        retention: Duration,
        persistent: Option<PersistentStore>,
        log_enabled: bool,
    ) -> Self {
        Self {
            state: RwLock::new(State::default()),
            persistent,
            retention,
            log_enabled,
            stats: StatsRecorder::default(),
            scan_lock: Mutex::new(()),
        }
    }

    pub(crate) fn log_enabled(&self) -> bool {
        self.log_enabled
    }

    pub(crate) async fn add(&self, key: String, value: Value) {
        let mut state = self.state.write().await;
        state.insert(key, value);
    }

    pub(crate) async fn get(&self, key: &str) -> Result<Value> {
        loop {
            let epoch = {
                let state = self.state.read().await;
                if let Some(entry) = state.entries.get(key) {
                    self.stats.record_hit();
                    return Ok(entry.value.clone());
                }
                if state.is_deleted_on_disk(key) {
                    // the file, if any, belongs to a delete still in flight
                    self.stats.record_miss();
                    return Err(CacheError::KeyNotFound(key.to_string()));
                }
                state.disk_epoch
            };

            let found = match &self.persistent {
                Some(persistent) => persistent.read(key).await,
                None => None,
            };
            let Some(value) = found else {
                self.stats.record_miss();
                return Err(CacheError::KeyNotFound(key.to_string()));
            };

            let mut state = self.state.write().await;
            if let Some(entry) = state.entries.get(key) {
                // an add or another promotion got there first
                self.stats.record_hit();
                return Ok(entry.value.clone());
            }
            if state.disk_epoch != epoch || state.is_deleted_on_disk(key) {
                // the file may have been replaced or deleted while it was read
                continue;
            }
            state.insert(key.to_string(), value.clone());
            drop(state);

            self.stats.record_disk_hit();
            if self.log_enabled {
                debug!(key = %key, "Promoted entry from disk");
            }
            return Ok(value);
        }
    }

    /// Removes `key` from both tiers.
    ///
    /// The file is unlinked outside the lock. Until that finishes the key is
    /// marked as removing: lookups report it missing and scans leave it in
    /// memory. Callers must not drop this future before it completes.
    pub(crate) async fn delete(&self, key: &str) {
        let in_memory = {
            let mut state = self.state.write().await;
            let in_memory = state.entries.remove(key).is_some();
            if let Some(deleted) = state.demoting.get_mut(key) {
                *deleted = true;
            }
            if self.persistent.is_some() {
                *state.removing.entry(key.to_string()).or_insert(0) += 1;
            }
            in_memory
        };

        if let Some(persistent) = &self.persistent {
            if let Err(e) = persistent.remove(key).await {
                if self.log_enabled {
                    warn!(key = %key, error = %e, "Failed to remove persisted value");
                }
            }

            let mut state = self.state.write().await;
            let finished = match state.removing.get_mut(key) {
                Some(pending) => {
                    *pending -= 1;
                    *pending == 0
                }
                None => false,
            };
            if finished {
                state.removing.remove(key);
            }
            state.disk_epoch += 1;
        }

        if self.log_enabled {
            debug!(key = %key, in_memory, "Deleted entry");
        }
    }

    pub(crate) async fn snapshot(&self) -> HashMap<String, Value> {
        let state = self.state.read().await;
        state
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }

    pub(crate) async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    // == Evict Expired ==
    /// Runs one scan: every entry at least `retention` old leaves memory,
    /// going to disk first when persistence is enabled.
    ///
    /// Returns the number of entries removed from memory. Callers must not
    /// drop this future before it completes.
    pub(crate) async fn evict_expired(&self) -> usize {
        let _scan = self.scan_lock.lock().await;
        let now = Instant::now();

        let Some(persistent) = &self.persistent else {
            let mut state = self.state.write().await;
            let before = state.entries.len();
            state
                .entries
                .retain(|_, entry| !entry.is_eligible_at(now, self.retention));
            let evicted = before - state.entries.len();
            drop(state);

            self.finish_scan(evicted);
            return evicted;
        };

        let batch: Vec<Demotion> = {
            let mut state = self.state.write().await;
            let batch: Vec<Demotion> = state
                .entries
                .iter()
                .filter(|(key, entry)| {
                    entry.is_eligible_at(now, self.retention)
                        && !state.removing.contains_key(key.as_str())
                })
                .map(|(key, entry)| Demotion {
                    key: key.clone(),
                    generation: entry.generation,
                    value: entry.value.clone(),
                })
                .collect();
            for demotion in &batch {
                state.demoting.insert(demotion.key.clone(), false);
            }
            batch
        };

        if batch.is_empty() {
            self.finish_scan(0);
            return 0;
        }

        for demotion in &batch {
            match persistent.write(&demotion.key, &demotion.value).await {
                Ok(()) => self.stats.record_demotion(),
                Err(e) => {
                    self.stats.record_persist_failure();
                    if self.log_enabled {
                        warn!(
                            key = %demotion.key,
                            error = %e,
                            "Failed to demote entry, dropping it from memory"
                        );
                    }
                }
            }
        }

        let mut state = self.state.write().await;
        // lookups that read the disk before this commit must read it again
        state.disk_epoch += 1;
        let mut evicted = 0;
        for demotion in batch {
            if state.demoting.remove(&demotion.key).unwrap_or(false) {
                // deleted mid-demotion: the file just written must not survive
                if let Err(e) = persistent.remove(&demotion.key).await {
                    if self.log_enabled {
                        warn!(key = %demotion.key, error = %e, "Failed to remove persisted value");
                    }
                }
                continue;
            }

            let unchanged = matches!(
                state.entries.get(&demotion.key),
                Some(entry) if entry.generation == demotion.generation
            );
            if unchanged {
                state.entries.remove(&demotion.key);
                evicted += 1;
            }
        }
        drop(state);

        self.finish_scan(evicted);
        evicted
    }

    fn finish_scan(&self, evicted: usize) {
        self.stats.record_evictions(evicted);
        if !self.log_enabled {
            return;
        }
        if evicted > 0 {
            info!(
                evicted,
                persisted = self.persistent.is_some(),
                "Evicted entries from memory"
            );
        } else {
            debug!("Cleaner scan found no entries to evict");
        }
    }
}

// == Cache Store ==
/// Two-tier cache with time-bounded memory residency.
///
/// All operations take `&self`; wrap the store in an `Arc` to share it
/// between tasks. Construction starts the background cleaner, which runs
/// until [`CacheStore::shutdown`] is called or the store is dropped.
#[derive(Debug)]
pub struct CacheStore {
    shared: Arc<Shared>,
    cleaner: Mutex<Option<Cleaner>>,
    scan_interval: Duration,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a store from `config` and starts its cleaner.
    ///
    /// Must be called from within a Tokio runtime, which hosts the cleaner.
    ///
    /// # Errors
    /// `InvalidConfiguration` if the scan interval is not positive, the
    /// retention is negative, or no runtime is available.
    pub fn new(config: &Config) -> Result<Self> {
        let (scan_interval, retention) = config.validate()?;
        let persistent = config
            .persistence_enabled
            .then(|| PersistentStore::new(config.data_dir.clone(), config.log_enabled));

        let shared = Arc::new(Shared::new(retention, persistent, config.log_enabled));
        let cleaner = Cleaner::spawn(Arc::clone(&shared), scan_interval)?;

        if config.log_enabled {
            info!(
                scan_interval_ms = config.scan_interval_ms,
                retention_ms = config.retention_ms,
                persistence = config.persistence_enabled,
                data_dir = ?config.data_dir,
                "Cache store initialized"
            );
        }

        Ok(Self {
            shared,
            cleaner: Mutex::new(Some(cleaner)),
            scan_interval,
        })
    }

    // == Add ==
    /// Stores a value in memory, replacing any existing entry for the key.
    ///
    /// The entry's age restarts at zero. A stale disk copy of the key is left
    /// alone; lookups always see the memory copy first.
    pub async fn add(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.shared.add(key.into(), value.into()).await;
    }

    /// Serializes `value` to JSON and stores it.
    pub async fn add_serialized<T: Serialize>(
        &self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.shared.add(key.into(), value).await;
        Ok(())
    }

    // == Get ==
    /// Retrieves a value, checking memory first and then disk.
    ///
    /// A disk hit is promoted back into memory with a fresh age; the disk copy
    /// is kept.
    ///
    /// # Errors
    /// `KeyNotFound` if neither tier holds the key.
    pub async fn get(&self, key: &str) -> Result<Value> {
        self.shared.get(key).await
    }

    /// Retrieves a value and decodes it into `T`.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.shared.get(key).await?;
        Ok(serde_json::from_value(value)?)
    }

    // == Delete ==
    /// Removes a key from memory and disk. Deleting a missing key is a no-op.
    ///
    /// The removal runs on its own task, so it completes even if the
    /// returned future is dropped.
    pub async fn delete(&self, key: &str) {
        let shared = Arc::clone(&self.shared);
        let key = key.to_string();
        let task = tokio::spawn(async move { shared.delete(&key).await });
        if let Err(e) = task.await {
            warn!(error = %e, "Delete task failed");
        }
    }

    // == Snapshot ==
    /// Copies the in-memory tier. Disk-only keys are not included.
    pub async fn snapshot(&self) -> HashMap<String, Value> {
        self.shared.snapshot().await
    }

    // == Evict Expired ==
    /// Runs a cleaner scan immediately and returns how many entries left memory.
    ///
    /// The scan runs on its own task, so it completes even if the returned
    /// future is dropped.
    pub async fn evict_expired(&self) -> usize {
        let shared = Arc::clone(&self.shared);
        match tokio::spawn(async move { shared.evict_expired().await }).await {
            Ok(evicted) => evicted,
            Err(e) => {
                warn!(error = %e, "Eviction scan failed");
                0
            }
        }
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let total_entries = self.shared.len().await;
        self.shared.stats.snapshot(total_entries)
    }

    // == Length ==
    /// Returns the number of entries currently in memory.
    pub async fn len(&self) -> usize {
        self.shared.len().await
    }

    /// Returns true if the memory tier is empty.
    pub async fn is_empty(&self) -> bool {
        self.shared.len().await == 0
    }

    pub fn retention(&self) -> Duration {
        self.shared.retention
    }

    pub fn scan_interval(&self) -> Duration {
        self.scan_interval
    }

    pub fn persistence_enabled(&self) -> bool {
        self.shared.persistent.is_some()
    }

    /// Returns true while the background cleaner is active.
    pub async fn is_running(&self) -> bool {
        match self.cleaner.lock().await.as_ref() {
            Some(cleaner) => !cleaner.is_finished(),
            None => false,
        }
    }

    // == Shutdown ==
    /// Stops the cleaner, waits for it, then runs one last scan so entries
    /// already past the retention window are demoted. Later calls do nothing.
    pub async fn shutdown(&self) {
        let Some(cleaner) = self.cleaner.lock().await.take() else {
            return;
        };
        cleaner.stop().await;

        let drained = self.evict_expired().await;
        if self.shared.log_enabled {
            info!(drained, "Cache store shut down");
        }
    }
}
