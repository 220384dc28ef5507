use crate::cache::config::{CacheConfig, duration_to_ms, ttl_to_ms};
use crate::cache::entry::{CacheEntry, EntryInfo};
use crate::cache::metrics::{CacheMetrics, CacheMetricsSnapshot};
use crate::cache::sweep::{SWEEP_LOG_TARGET, Store, SweepReport, run_sweep};
use crate::cache::worker::SweepWorker;
use crate::errors::CacheError;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub(crate) struct Shared<V> {
    store: Store<V>,
    config: RwLock<CacheConfig>, // runtime adjustable
    metrics: CacheMetrics,
    worker: Mutex<Option<SweepWorker>>,
}

impl<V: Clone> Shared<V> {
    pub(crate) fn sweep_interval(&self) -> Duration {
        self.config.read().sweep_interval()
    }

    pub(crate) fn sweep(&self, should_stop: &dyn Fn() -> bool) -> SweepReport {
        run_sweep(&self.store, &self.metrics, should_stop)
    }
}

impl<V> Drop for Shared<V> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.signal();
        }
    }
}

/// A thread-safe, in-memory cache whose entries are evicted or refreshed by a periodic sweep.
///
/// Handles are cheap to clone and share one store. The sweep thread is started with
/// [`GlobalCache::start`] (or [`GlobalCache::initialize`]) and stopped with
/// [`GlobalCache::stop`]; dropping the last handle also signals it to exit.
pub struct GlobalCache<V> {
    shared: Arc<Shared<V>>,
}

impl<V> Clone for GlobalCache<V> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<V> GlobalCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache without starting the sweep thread.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                store: RwLock::new(HashMap::new()),
                config: RwLock::new(config),
                metrics: CacheMetrics::default(),
                worker: Mutex::new(None),
            }),
        }
    }

    /// Creates a cache and starts its sweep thread.
    ///
    /// # Errors
    /// Returns `Init` if the sweep thread cannot be spawned; no cache is returned in that case.
    pub fn initialize(config: CacheConfig) -> Result<Self, CacheError> {
        let cache = Self::new(config);
        cache.start()?;
        Ok(cache)
    }

    /// Starts the sweep thread. Does nothing if it is already running.
    ///
    /// # Errors
    /// Returns `Init` if the thread cannot be spawned.
    pub fn start(&self) -> Result<(), CacheError> {
        let mut slot = self.shared.worker.lock();
        if slot.as_ref().is_some_and(|w| !w.is_finished()) {
            return Ok(());
        }
        let thread_name = self.shared.config.read().thread_name.clone();
        let worker = SweepWorker::spawn(Arc::downgrade(&self.shared), &thread_name)?;
        *slot = Some(worker);
        log::info!(
            "cache sweep started (interval {} ms)",
            duration_to_ms(self.shared.sweep_interval())
        );
        Ok(())
    }

    /// Stops the sweep thread and waits for it to exit. A sweep in progress finishes its
    /// current refresh and skips the rest of its worklist.
    pub fn stop(&self) {
        let worker = self.shared.worker.lock().take();
        if let Some(worker) = worker {
            worker.stop();
            log::info!("cache sweep stopped");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.worker.lock().as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Returns the value stored under `key`.
    ///
    /// Refreshable entries are marked as read. Staleness is not checked here: a value that
    /// expired since the last sweep is still returned.
    ///
    /// # Errors
    /// Returns `Miss` if the key is absent.
    pub fn get(&self, key: &str) -> Result<V, CacheError> {
        let entry = self.shared.store.read().get(key).cloned();
        match entry {
            Some(entry) => {
                CacheMetrics::bump(&self.shared.metrics.hits, 1);
                Ok(entry.read())
            }
            None => {
                CacheMetrics::bump(&self.shared.metrics.misses, 1);
                Err(CacheError::Miss(key.to_string()))
            }
        }
    }

    /// Stores `value` as a plain entry with the configured default TTL, replacing any previous entry.
    pub fn put(&self, key: impl Into<String>, value: V) {
        let ttl = self.shared.config.read().default_ttl();
        self.put_entry(key, CacheEntry::with_optional_ttl(value, ttl));
    }

    /// Stores a caller-built entry, replacing any previous entry.
    pub fn put_entry(&self, key: impl Into<String>, entry: CacheEntry<V>) {
        let entry = Arc::new(entry);
        // The replaced entry is dropped after the lock is released.
        let _previous = self.shared.store.write().insert(key.into(), entry);
        CacheMetrics::bump(&self.shared.metrics.puts, 1);
    }

    /// Existence check. Does not count as a read.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.shared.store.read().contains_key(key)
    }

    /// Removes `key`. Returns whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.shared.store.write().remove(key);
        if removed.is_some() {
            CacheMetrics::bump(&self.shared.metrics.removes, 1);
        }
        removed.is_some()
    }

    pub fn clear(&self) {
        let drained: Vec<_> = self.shared.store.write().drain().collect();
        log::debug!("cache cleared ({} entries)", drained.len());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.store.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.store.read().is_empty()
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.shared.store.read().keys().cloned().collect()
    }

    /// Describes the entry under `key` without touching it.
    #[must_use]
    pub fn entry_info(&self, key: &str) -> Option<EntryInfo> {
        let entry = self.shared.store.read().get(key).cloned();
        entry.map(|e| e.info())
    }

    /// Runs one sweep cycle on the calling thread.
    pub fn sweep_now(&self) -> SweepReport {
        let report = self.shared.sweep(&|| false);
        log::debug!(target: SWEEP_LOG_TARGET, "manual sweep evicted {}", report.evicted());
        report
    }

    /// Sets the sweep interval. A running sweep thread abandons its current wait and
    /// starts a new one with this interval.
    pub fn set_sweep_interval(&self, interval: Duration) {
        self.shared.config.write().sweep_interval_ms = duration_to_ms(interval).max(1);
        if let Some(worker) = self.shared.worker.lock().as_ref() {
            worker.rearm();
        }
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        self.shared.sweep_interval()
    }

    /// Changes the TTL used by future `put(key, value)` calls.
    pub fn set_default_ttl(&self, ttl: Option<Duration>) {
        self.shared.config.write().default_ttl_ms = ttl_to_ms(ttl);
    }

    #[must_use]
    pub fn config(&self) -> CacheConfig {
        self.shared.config.read().clone()
    }

    #[must_use]
    pub fn metrics_snapshot(&self) -> CacheMetricsSnapshot {
        self.shared.metrics.snapshot()
    }
}

impl<V> Default for GlobalCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
