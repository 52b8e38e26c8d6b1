//! Cache Statistics Module
//!
//! Tracks cache activity across both tiers: hits, misses, promotions,
//! demotions and evictions.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time view of the cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups served from memory
    pub hits: u64,
    /// Lookups served from disk and promoted back to memory
    pub disk_hits: u64,
    /// Lookups that found the key in neither tier
    pub misses: u64,
    /// Values written to disk on eviction
    pub demotions: u64,
    /// Entries removed from memory by the cleaner
    pub evictions: u64,
    /// Demotions that failed to reach disk
    pub persist_failures: u64,
    /// Current number of entries in memory
    pub total_entries: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate over both tiers.
    ///
    /// Returns (hits + disk_hits) / (hits + disk_hits + misses), or 0.0 if no
    /// lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let found = self.hits + self.disk_hits;
        let total = found + self.misses;
        if total == 0 {
            0.0
        } else {
            found as f64 / total as f64
        }
    }
}

// == Stats Recorder ==
/// Lock-free counters updated by the store and the cleaner.
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    hits: AtomicU64,
    disk_hits: AtomicU64,
    misses: AtomicU64,
    demotions: AtomicU64,
    evictions: AtomicU64,
    persist_failures: AtomicU64,
}

impl StatsRecorder {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disk_hit(&self) {
        self.disk_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_demotion(&self) {
        self.demotions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persist_failure(&self) {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Reads every counter into a [`CacheStats`].
    pub fn snapshot(&self, total_entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            disk_hits: self.disk_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            demotions: self.demotions.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            total_entries,
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = StatsRecorder::default().snapshot(0);
        assert_eq!(stats, CacheStats::default());
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_counts_disk_hits() {
        let recorder = StatsRecorder::default();
        recorder.record_hit();
        recorder.record_disk_hit();
        recorder.record_miss();
        recorder.record_miss();

        let stats = recorder.snapshot(1);
        assert_eq!(stats.hit_rate(), 0.5);
        assert_eq!(stats.total_entries, 1);
    }

    #[test]
    fn test_hit_rate_all_misses() {
        let recorder = StatsRecorder::default();
        recorder.record_miss();
        assert_eq!(recorder.snapshot(0).hit_rate(), 0.0);
    }

    #[test]
    fn test_record_evictions_and_demotions() {
        let recorder = StatsRecorder::default();
        recorder.record_evictions(3);
        recorder.record_evictions(2);
        recorder.record_demotion();
        recorder.record_persist_failure();

        let stats = recorder.snapshot(0);
        assert_eq!(stats.evictions, 5);
        assert_eq!(stats.demotions, 1);
        assert_eq!(stats.persist_failures, 1);
    }

    #[test]
    fn test_stats_serialize() {
        let stats = CacheStats {
            hits: 2,
            ..CacheStats::default()
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["hits"], 2);
        assert_eq!(json["total_entries"], 0);
    }
}
