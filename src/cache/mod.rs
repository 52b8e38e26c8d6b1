//! Cache Module
//!
//! Provides the two-tier cache: an in-memory map with age-based eviction,
//! backed by optional JSON-file persistence.

mod entry;
mod persistent;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use persistent::PersistentStore;
pub use stats::CacheStats;
pub use store::CacheStore;

pub(crate) use store::Shared;
