//! Background Tasks Module
//!
//! Contains background tasks that run periodically for the lifetime of a cache.
//!
//! # Tasks
//! - Cleaner: evicts entries past the retention window at a fixed interval,
//!   demoting them to disk when persistence is enabled

mod cleaner;

pub use cleaner::Cleaner;
