//! Tiered Cache demo
//!
//! Builds a cache from the environment, stores two values, waits for the
//! cleaner to move them out of memory and reads one back.

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tiered_cache::{CacheStore, Config};

/// Entry point for the demo.
///
/// # Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache store, which starts its cleaner
/// 4. Add two values and read one back from memory
/// 5. Sleep past a scan and the retention window
/// 6. Read the other value back (from disk when persistence is on)
/// 7. Shut the store down
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tiered_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: scan_interval={}ms, retention={}ms, persistence={}, data_dir={}",
        config.scan_interval_ms,
        config.retention_ms,
        config.persistence_enabled,
        config.data_dir.display()
    );

    let cache = CacheStore::new(&config)?;

    cache.add("some", 42).await;
    cache.add("another", 100).await;

    match cache.get("some").await {
        Ok(value) => println!("Value from memory cache: {value}"),
        Err(e) => println!("Error on get from memory cache: {e}"),
    }

    // one full scan after the entries age out
    let wait = cache.retention() + cache.scan_interval() * 2;
    tokio::time::sleep(wait).await;
    info!(in_memory = cache.len().await, "Woke up after {}ms", wait.as_millis());

    match cache.get("another").await {
        Ok(value) => println!("Value after eviction: {value}"),
        Err(e) => println!("Error on get after eviction: {e}"),
    }

    let stats = cache.stats().await;
    println!("Stats: {}", serde_json::to_string(&stats)?);

    cache.shutdown().await;
    Ok(())
}
