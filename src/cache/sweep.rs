use crate::cache::entry::CacheEntry;
use crate::cache::metrics::CacheMetrics;
use crate::errors::CacheError;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;

/// Log target for sweep activity; routed to its own file by `logger::configure_logging`.
pub const SWEEP_LOG_TARGET: &str = "globalcache::sweep";

pub(crate) type Store<V> = RwLock<HashMap<String, Arc<CacheEntry<V>>>>;

/// Outcome of one sweep cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub evicted_untouched: u64,
    pub evicted_stale: u64,
    pub refreshed: u64,
    pub refresh_failed: u64,
    /// Worklist keys that were removed or replaced before their refresh ran.
    pub refresh_skipped: u64,
    pub cancelled: bool,
}

impl SweepReport {
    #[must_use]
    pub const fn evicted(&self) -> u64 {
        self.evicted_untouched + self.evicted_stale
    }
}

/// Runs one reconciliation pass over `store`.
///
/// Eviction decisions and the refresh worklist are made under the write lock.
/// Refreshes run afterwards without any map lock; each worklist key is looked up
/// again and only refreshed if it still maps to the entry seen while locked.
/// `should_stop` is consulted between the phases and before every refresh.
pub(crate) fn run_sweep<V>(
    store: &Store<V>,
    metrics: &CacheMetrics,
    should_stop: &dyn Fn() -> bool,
) -> SweepReport
where
    V: Clone,
{
    let started = Instant::now();
    let mut report = SweepReport::default();
    let mut worklist: Vec<(String, Arc<CacheEntry<V>>)> = Vec::new();

    {
        let mut map = store.write();
        let now = Instant::now();
        map.retain(|key, entry| match &**entry {
            CacheEntry::Refreshable(e) => {
                if e.is_untouched() {
                    report.evicted_untouched += 1;
                    false
                } else {
                    if e.is_stale_at(now) {
                        worklist.push((key.clone(), Arc::clone(entry)));
                    }
                    true
                }
            }
            CacheEntry::Plain(e) => {
                if e.is_stale_at(now) {
                    report.evicted_stale += 1;
                    false
                } else {
                    true
                }
            }
        });
    }

    if !worklist.is_empty() && should_stop() {
        report.cancelled = true;
    } else {
        for (key, entry) in worklist {
            if should_stop() {
                report.cancelled = true;
                break;
            }
            let still_current = store.read().get(&key).is_some_and(|cur| Arc::ptr_eq(cur, &entry));
            if !still_current {
                report.refresh_skipped += 1;
                log::debug!(target: SWEEP_LOG_TARGET, "skip refresh of {key}: entry removed or replaced");
                continue;
            }
            let Some(refreshable) = entry.as_refreshable() else {
                continue;
            };
            match catch_unwind(AssertUnwindSafe(|| refreshable.refresh())) {
                Ok(Ok(())) => report.refreshed += 1,
                Ok(Err(e)) => {
                    report.refresh_failed += 1;
                    let err = CacheError::Refresh { key, message: e.to_string() };
                    log::warn!(target: SWEEP_LOG_TARGET, "{err}");
                }
                Err(_) => {
                    report.refresh_failed += 1;
                    log::error!(target: SWEEP_LOG_TARGET, "refresher for {key} panicked");
                }
            }
        }
    }

    CacheMetrics::bump(&metrics.sweeps, 1);
    CacheMetrics::bump(&metrics.untouched_evictions, report.evicted_untouched);
    CacheMetrics::bump(&metrics.stale_evictions, report.evicted_stale);
    CacheMetrics::bump(&metrics.refreshes, report.refreshed);
    CacheMetrics::bump(&metrics.refresh_failures, report.refresh_failed);
    CacheMetrics::bump(
        &metrics.total_sweep_ns,
        u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX),
    );
    log::debug!(
        target: SWEEP_LOG_TARGET,
        "sweep: untouched={} stale={} refreshed={} failed={} skipped={} cancelled={}",
        report.evicted_untouched,
        report.evicted_stale,
        report.refreshed,
        report.refresh_failed,
        report.refresh_skipped,
        report.cancelled
    );
    report
}
