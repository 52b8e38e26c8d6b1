//! Tiered Cache - A process-local key/value cache
//!
//! Entries live in memory for a fixed retention window, then are either
//! dropped or demoted to JSON files on disk and promoted back on access.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::CacheStore;
pub use config::Config;
pub use error::{CacheError, Result};
