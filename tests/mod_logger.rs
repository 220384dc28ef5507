use globalcache::cache::{CacheConfig, CacheEntry, GlobalCache, SWEEP_LOG_TARGET};
use globalcache::errors::RefreshError;
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

// log4rs installs a process-wide logger, so this binary configures it exactly once.
#[test]
fn configure_logging_routes_sweep_events_to_own_file() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("cache_logs");
    globalcache::logger::configure_logging(Some(&base), Some("debug"), Some(3)).unwrap();
    assert!(base.join("app.log").exists());
    assert!(base.join("sweep.log").exists());

    let cache: GlobalCache<u8> = GlobalCache::new(CacheConfig::default());
    cache.put_entry("flaky", CacheEntry::refreshable(1, Duration::ZERO, || Err::<u8, RefreshError>("down".into())));
    cache.get("flaky").unwrap();
    cache.sweep_now();
    log::info!("app event");
    log::logger().flush();

    let sweep_log = fs::read_to_string(base.join("sweep.log")).unwrap();
    assert!(sweep_log.contains("Refresh failed for flaky: down"), "{sweep_log}");
    assert!(sweep_log.contains(SWEEP_LOG_TARGET));
    let app_log = fs::read_to_string(base.join("app.log")).unwrap();
    assert!(app_log.contains("app event"));
    assert!(!app_log.contains("Refresh failed"), "sweep target is not additive");

    assert!(globalcache::logger::configure_logging(Some(&base), None, None).is_err());
}
