use globalcache::cache::{CacheConfig, CacheEntry, GlobalCache};
use proptest::prelude::*;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Op {
    Put(u8, u32),
    PutStale(u8, u32),
    Get(u8),
    Remove(u8),
    Sweep,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..16, any::<u32>()).prop_map(|(k, v)| Op::Put(k, v)),
        (0u8..16, any::<u32>()).prop_map(|(k, v)| Op::PutStale(k, v)),
        (0u8..16).prop_map(Op::Get),
        (0u8..16).prop_map(Op::Remove),
        Just(Op::Sweep),
    ]
}

proptest! {
    #![proptest_config(proptest::test_runner::Config {
        failure_persistence: Some(Box::new(proptest::test_runner::FileFailurePersistence::WithSource("proptest-regressions"))),
        cases: 64,
        .. proptest::test_runner::Config::default()
    })]
    #[test]
    fn prop_cache_matches_model(ops in proptest::collection::vec(op(), 1..64)) {
        // Model: key -> (value, already stale). Plain entries with a long TTL never expire
        // during a case; zero-TTL entries disappear at the next sweep.
        let cache: GlobalCache<u32> = GlobalCache::new(CacheConfig::default());
        let mut model: HashMap<String, (u32, bool)> = HashMap::new();
        for op in ops {
            match op {
                Op::Put(k, v) => {
                    cache.put_entry(format!("k{k}"), CacheEntry::plain(v, Duration::from_secs(3600)));
                    model.insert(format!("k{k}"), (v, false));
                }
                Op::PutStale(k, v) => {
                    cache.put_entry(format!("k{k}"), CacheEntry::plain(v, Duration::ZERO));
                    model.insert(format!("k{k}"), (v, true));
                }
                Op::Get(k) => {
                    let key = format!("k{k}");
                    match model.get(&key) {
                        Some((v, _)) => {
                            prop_assert_eq!(cache.get(&key).unwrap(), *v);
                        }
                        None => {
                            prop_assert!(cache.get(&key).unwrap_err().is_miss());
                        }
                    }
                }
                Op::Remove(k) => {
                    let key = format!("k{k}");
                    prop_assert_eq!(cache.remove(&key), model.remove(&key).is_some());
                }
                Op::Sweep => {
                    let expected = model.values().filter(|(_, stale)| *stale).count() as u64;
                    let report = cache.sweep_now();
                    prop_assert_eq!(report.evicted_stale, expected);
                    model.retain(|_, (_, stale)| !*stale);
                }
            }
            prop_assert_eq!(cache.len(), model.len());
        }
    }

    #[test]
    fn prop_unread_refreshables_never_survive_a_sweep(
        keys in proptest::collection::hash_set("[a-z]{1,8}", 1..32),
        read_mask in any::<u32>(),
    ) {
        let cache: GlobalCache<u32> = GlobalCache::new(CacheConfig::default());
        let keys: Vec<String> = keys.into_iter().collect();
        for k in &keys {
            cache.put_entry(k.clone(), CacheEntry::refreshable(0, Duration::from_secs(3600), || Ok(1)));
        }
        let mut read = 0usize;
        for (i, k) in keys.iter().enumerate() {
            if read_mask & (1 << (i % 32)) != 0 {
                cache.get(k).unwrap();
                read += 1;
            }
        }
        let report = cache.sweep_now();
        prop_assert_eq!(report.evicted_untouched as usize, keys.len() - read);
        prop_assert_eq!(cache.len(), read);
        prop_assert_eq!(report.refreshed, 0);
    }
}
