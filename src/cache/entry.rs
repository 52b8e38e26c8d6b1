//! Cache Entry Module
//!
//! Defines the in-memory unit of the cache: a value plus its insertion stamp.

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

// == Cache Entry ==
/// Represents a single in-memory cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored value
    pub value: Value,
    /// Monotonic instant of the last insertion (add or promotion)
    pub inserted_at: Instant,
    /// Store-wide insertion counter, unique per insertion
    pub generation: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry stamped with the current instant.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `generation` - Insertion counter assigned by the owning store
    pub fn new(value: Value, generation: u64) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
            generation,
        }
    }

    // == Age ==
    /// Returns how long the entry has been resident as of `now`.
    ///
    /// Saturates at zero if `now` precedes the insertion instant.
    pub fn age_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.inserted_at)
    }

    /// Returns how long the entry has been resident.
    pub fn age(&self) -> Duration {
        self.age_at(Instant::now())
    }

    // == Eviction Eligibility ==
    /// Checks whether the entry should leave memory on a scan at `now`.
    ///
    /// Boundary condition: an entry whose age equals the retention window is
    /// eligible, so a scan running exactly at `inserted_at + retention` evicts it.
    pub fn is_eligible_at(&self, now: Instant, retention: Duration) -> bool {
        self.age_at(now) >= retention
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_creation() {
        let entry = CacheEntry::new(json!("test_value"), 7);

        assert_eq!(entry.value, json!("test_value"));
        assert_eq!(entry.generation, 7);
        assert!(entry.age() < Duration::from_secs(1));
    }

    #[test]
    fn test_eligibility_boundary_is_inclusive() {
        let entry = CacheEntry::new(json!(42), 1);
        let retention = Duration::from_secs(1);
        let boundary = entry.inserted_at + retention;

        assert!(entry.is_eligible_at(boundary, retention), "Entry should be eligible at boundary");
        assert!(!entry.is_eligible_at(boundary - Duration::from_nanos(1), retention));
        assert!(entry.is_eligible_at(boundary + Duration::from_millis(1), retention));
    }

    #[test]
    fn test_zero_retention_is_always_eligible() {
        let entry = CacheEntry::new(json!({"nested": [1, 2, 3]}), 1);
        assert!(entry.is_eligible_at(entry.inserted_at, Duration::ZERO));
    }

    #[test]
    fn test_age_saturates_before_insertion() {
        let entry = CacheEntry::new(json!(null), 1);
        let earlier = entry.inserted_at - Duration::from_millis(5);
        assert_eq!(entry.age_at(earlier), Duration::ZERO);
    }

    #[test]
    fn test_age_grows_over_time() {
        let entry = CacheEntry::new(json!(1), 1);
        let later = entry.inserted_at + Duration::from_millis(1500);
        assert_eq!(entry.age_at(later), Duration::from_millis(1500));
    }
}
