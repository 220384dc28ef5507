mod config;
mod core;
mod entry;
mod metrics;
mod sweep;
mod worker;

pub use config::{
    CacheConfig, DEFAULT_SWEEP_INTERVAL_MS, DEFAULT_THREAD_NAME, DEFAULT_TTL_MS, ENV_DEFAULT_TTL_MS,
    ENV_SWEEP_INTERVAL_MS,
};
pub use self::core::GlobalCache;
pub use entry::{CacheEntry, EntryInfo, EntryKind, PlainEntry, RefreshableEntry, Refresher};
pub use metrics::{CacheMetrics, CacheMetricsSnapshot};
pub use sweep::{SWEEP_LOG_TARGET, SweepReport};
