//! In-process key/value cache with periodic eviction and refresh.
//!
//! Values are stored either as plain entries, which expire a fixed time after creation,
//! or as refreshable entries, which track reads and recompute their value through a
//! caller-supplied refresher. A background sweep removes expired and unread entries and
//! refreshes the ones still in use.
//!
//! ```no_run
//! use globalcache::cache::{CacheConfig, CacheEntry, GlobalCache};
//! use std::time::Duration;
//!
//! let cache: GlobalCache<String> = GlobalCache::initialize(CacheConfig::default())?;
//! cache.put("greeting", "hello".to_string());
//! cache.put_entry(
//!     "states",
//!     CacheEntry::refreshable("CA,NY".to_string(), Duration::from_secs(60), || {
//!         Ok("CA,NY,TX".to_string())
//!     }),
//! );
//! assert_eq!(cache.get("greeting")?, "hello");
//! cache.stop();
//! # Ok::<(), globalcache::errors::CacheError>(())
//! ```

pub mod cache;
pub mod cli;
pub mod errors;
pub mod logger;

pub use cache::{CacheConfig, CacheEntry, GlobalCache, SweepReport};
pub use errors::CacheError;

/// Initializes logging from the environment (`GLOBALCACHE_LOG_*`).
///
/// This function should be called once, before the first cache is created.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    logger::configure_from_env()?;
    Ok(())
}
