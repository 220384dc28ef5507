use super::command::StressOptions;
use crate::cache::{CacheEntry, CacheMetricsSnapshot, GlobalCache, SweepReport};
use crate::errors::RefreshError;
use rand::Rng;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Values written for key `k{n}` are always in `[n * KEY_STRIDE, (n + 1) * KEY_STRIDE)`,
/// which lets readers detect a value served under the wrong key.
const KEY_STRIDE: u64 = 1_000_000_000;

#[derive(Debug, Clone, Serialize)]
pub struct StressReport {
    pub threads: usize,
    pub elapsed_ms: u64,
    pub gets: u64,
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
    pub contains: u64,
    /// Reads that returned a value belonging to another key.
    pub mismatched_reads: u64,
    /// Keys left in the cache that were never written by the run.
    pub foreign_keys: u64,
    pub final_len: usize,
    /// Sweep run on the caller's thread once the workers have finished.
    pub final_sweep: SweepReport,
    pub metrics: CacheMetricsSnapshot,
}

impl StressReport {
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.mismatched_reads == 0 && self.foreign_keys == 0
    }
}

#[derive(Default)]
struct Tally {
    gets: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    puts: AtomicU64,
    contains: AtomicU64,
    mismatched: AtomicU64,
}

fn key_name(n: usize) -> String {
    format!("k{n}")
}

fn key_index(key: &str) -> Option<usize> {
    key.strip_prefix('k').and_then(|s| s.parse().ok())
}

/// Clamps a ratio into `0..=1`; NaN and infinities count as 0.
fn probability(ratio: f64) -> f64 {
    if ratio.is_finite() { ratio.clamp(0.0, 1.0) } else { 0.0 }
}

fn owner_of(value: u64) -> u64 {
    value / KEY_STRIDE
}

fn refreshable_entry(idx: u64, seq: u64, ttl: Duration, failing: bool) -> CacheEntry<u64> {
    let refreshed = AtomicU64::new(seq);
    CacheEntry::refreshable(idx * KEY_STRIDE + seq, ttl, move || {
        if failing {
            return Err::<u64, RefreshError>("injected refresh failure".into());
        }
        let next = refreshed.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(idx * KEY_STRIDE + next % KEY_STRIDE)
    })
}

/// Runs mixed get/put/contains traffic against `cache` from `opts.threads` threads.
///
/// The cache's own sweep thread (if started) runs concurrently. After the run one
/// more sweep is made and the store is checked for keys outside the key space.
pub fn run_stress(cache: &GlobalCache<u64>, opts: &StressOptions) -> StressReport {
    let keys = opts.keys.max(1);
    let threads = opts.threads.max(1);
    let refreshable_ratio = probability(opts.refreshable_ratio);
    let failing_ratio = probability(opts.failing_ratio);
    let tally = Tally::default();
    let started = Instant::now();
    let deadline = started + opts.duration;

    log::info!("stress: {threads} threads, {keys} keys, {} ms", opts.duration.as_millis());
    std::thread::scope(|s| {
        for t in 0..threads {
            let tally = &tally;
            s.spawn(move || {
                let mut rng = rand::rng();
                let mut seq: u64 = (t as u64) << 32;
                while Instant::now() < deadline {
                    let idx = rng.random_range(0..keys);
                    let key = key_name(idx);
                    match rng.random_range(0..10u8) {
                        0..=4 => {
                            tally.gets.fetch_add(1, Ordering::Relaxed);
                            match cache.get(&key) {
                                Ok(v) => {
                                    tally.hits.fetch_add(1, Ordering::Relaxed);
                                    if owner_of(v) != idx as u64 {
                                        tally.mismatched.fetch_add(1, Ordering::Relaxed);
                                    }
                                }
                                Err(_) => {
                                    tally.misses.fetch_add(1, Ordering::Relaxed);
                                }
                            }
                        }
                        5..=8 => {
                            seq = seq.wrapping_add(1);
                            let local = seq % KEY_STRIDE;
                            let entry = if rng.random_bool(refreshable_ratio) {
                                refreshable_entry(idx as u64, local, opts.ttl, rng.random_bool(failing_ratio))
                            } else {
                                CacheEntry::plain(idx as u64 * KEY_STRIDE + local, opts.ttl)
                            };
                            cache.put_entry(key, entry);
                            tally.puts.fetch_add(1, Ordering::Relaxed);
                        }
                        _ => {
                            let _ = cache.contains(&key);
                            tally.contains.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            });
        }
    });

    let final_sweep = cache.sweep_now();
    let foreign_keys = cache
        .keys()
        .iter()
        .filter(|k| key_index(k).is_none_or(|i| i >= keys))
        .count() as u64;
    let report = StressReport {
        threads,
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        gets: tally.gets.load(Ordering::Relaxed),
        hits: tally.hits.load(Ordering::Relaxed),
        misses: tally.misses.load(Ordering::Relaxed),
        puts: tally.puts.load(Ordering::Relaxed),
        contains: tally.contains.load(Ordering::Relaxed),
        mismatched_reads: tally.mismatched.load(Ordering::Relaxed),
        foreign_keys,
        final_len: cache.len(),
        final_sweep,
        metrics: cache.metrics_snapshot(),
    };
    if !report.is_consistent() {
        log::error!(
            "stress: inconsistent cache (mismatched_reads={}, foreign_keys={})",
            report.mismatched_reads,
            report.foreign_keys
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;

    #[test]
    fn key_names_round_trip_through_index() {
        assert_eq!(key_index(&key_name(42)), Some(42));
        assert_eq!(key_index("x42"), None);
    }

    #[test]
    fn short_run_without_sweep_is_consistent() {
        let cache = GlobalCache::new(CacheConfig::default());
        let opts = StressOptions { threads: 2, duration: Duration::from_millis(50), keys: 8, ..Default::default() };
        let report = run_stress(&cache, &opts);
        assert!(report.is_consistent());
        assert!(report.final_len <= 8);
        assert_eq!(report.gets, report.hits + report.misses);
        assert!(!report.final_sweep.cancelled);
        assert!(report.metrics.sweeps >= 1, "final sweep is counted");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["final_sweep"]["evicted_untouched"], report.final_sweep.evicted_untouched);
        assert_eq!(json["final_sweep"]["cancelled"], false);
    }

    #[test]
    fn non_finite_ratios_do_not_abort_the_run() {
        assert_eq!(probability(f64::NAN), 0.0);
        assert_eq!(probability(f64::INFINITY), 0.0);
        assert_eq!(probability(1.5), 1.0);
        let cache = GlobalCache::new(CacheConfig::default());
        let opts = StressOptions {
            threads: 2,
            duration: Duration::from_millis(30),
            keys: 4,
            refreshable_ratio: f64::NAN,
            failing_ratio: f64::NEG_INFINITY,
            ..Default::default()
        };
        let report = run_stress(&cache, &opts);
        assert!(report.puts > 0);
        assert!(report.is_consistent());
    }

    #[test]
    fn refreshable_values_stay_in_key_range() {
        let e = refreshable_entry(3, 7, Duration::ZERO, false);
        let r = e.as_refreshable().unwrap();
        r.refresh().unwrap();
        assert_eq!(owner_of(e.value()), 3);
    }
}
