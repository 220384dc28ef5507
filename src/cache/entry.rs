use crate::errors::RefreshError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

/// Produces a fresh value for a refreshable entry.
///
/// Implemented for any `Fn() -> Result<V, RefreshError>` closure, so most callers
/// pass a closure that re-runs their lookup.
pub trait Refresher<V>: Send + Sync {
    fn refresh(&self) -> Result<V, RefreshError>;
}

impl<V, F> Refresher<V> for F
where
    F: Fn() -> Result<V, RefreshError> + Send + Sync,
{
    fn refresh(&self) -> Result<V, RefreshError> {
        self()
    }
}

#[inline]
fn elapsed_reached(reference: Instant, ttl: Option<Duration>, now: Instant) -> bool {
    ttl.is_some_and(|ttl| now.saturating_duration_since(reference) >= ttl)
}

/// An entry whose staleness is measured from its creation.
pub struct PlainEntry<V> {
    value: V,
    ttl: Option<Duration>,
    created_at: Instant,
    created_wall: DateTime<Utc>,
}

impl<V: Clone> PlainEntry<V> {
    #[must_use]
    pub fn new(value: V, ttl: Option<Duration>) -> Self {
        Self { value, ttl, created_at: Instant::now(), created_wall: Utc::now() }
    }

    #[must_use]
    pub fn value(&self) -> V {
        self.value.clone()
    }

    #[must_use]
    pub const fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Instant::now())
    }

    #[must_use]
    pub fn is_stale_at(&self, now: Instant) -> bool {
        elapsed_reached(self.created_at, self.ttl, now)
    }
}

struct RefreshState<V> {
    value: V,
    refreshed_at: Instant,
    last_accessed_at: Option<Instant>,
    untouched: bool,
    /// Bumped on every touch; lets a refresh tell whether a read raced with it.
    reads: u64,
    refresh_count: u64,
}

impl<V> RefreshState<V> {
    fn mark_read(&mut self) {
        self.last_accessed_at = Some(Instant::now());
        self.untouched = false;
        self.reads = self.reads.wrapping_add(1);
    }
}

/// An entry that tracks reads and can recompute its own value.
///
/// Staleness runs from creation or the last successful refresh; reads never move it.
/// A refresh puts the entry back into the untouched state, so a value nobody reads
/// after refreshing is dropped by the next sweep.
pub struct RefreshableEntry<V> {
    ttl: Option<Duration>,
    created_at: Instant,
    created_wall: DateTime<Utc>,
    refresher: Box<dyn Refresher<V>>,
    state: Mutex<RefreshState<V>>,
}

impl<V: Clone> RefreshableEntry<V> {
    pub fn new<F>(value: V, ttl: Option<Duration>, refresher: F) -> Self
    where
        F: Fn() -> Result<V, RefreshError> + Send + Sync + 'static,
    {
        Self::with_refresher(value, ttl, refresher)
    }

    /// Like [`RefreshableEntry::new`] for refresh strategies that are not closures.
    pub fn with_refresher<R>(value: V, ttl: Option<Duration>, refresher: R) -> Self
    where
        R: Refresher<V> + 'static,
    {
        let now = Instant::now();
        Self {
            ttl,
            created_at: now,
            created_wall: Utc::now(),
            refresher: Box::new(refresher),
            state: Mutex::new(RefreshState {
                value,
                refreshed_at: now,
                last_accessed_at: None,
                untouched: true,
                reads: 0,
                refresh_count: 0,
            }),
        }
    }

    #[must_use]
    pub fn value(&self) -> V {
        self.state.lock().value.clone()
    }

    #[must_use]
    pub const fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn touch(&self) {
        self.state.lock().mark_read();
    }

    /// Touches and returns the current value under one lock acquisition.
    pub(crate) fn touch_and_read(&self) -> V {
        let mut st = self.state.lock();
        st.mark_read();
        st.value.clone()
    }

    #[must_use]
    pub fn is_untouched(&self) -> bool {
        self.state.lock().untouched
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Instant::now())
    }

    #[must_use]
    pub fn is_stale_at(&self, now: Instant) -> bool {
        elapsed_reached(self.state.lock().refreshed_at, self.ttl, now)
    }

    #[must_use]
    pub fn last_accessed_at(&self) -> Option<Instant> {
        self.state.lock().last_accessed_at
    }

    #[must_use]
    pub fn refresh_count(&self) -> u64 {
        self.state.lock().refresh_count
    }

    /// Runs the refresher and installs its value.
    ///
    /// The state lock is not held while the refresher runs, so readers keep
    /// getting the previous value until the new one is in place. A read that lands
    /// while the refresher runs still counts as activity after the install. On
    /// failure the entry is left untouched by this call.
    ///
    /// # Errors
    /// Returns whatever the refresher returned.
    pub fn refresh(&self) -> Result<(), RefreshError> {
        let reads_before = self.state.lock().reads;
        let fresh = self.refresher.refresh()?;
        let mut st = self.state.lock();
        st.value = fresh;
        st.refreshed_at = Instant::now();
        st.untouched = st.reads == reads_before;
        st.refresh_count += 1;
        Ok(())
    }
}

/// A stored value together with its staleness bookkeeping.
pub enum CacheEntry<V> {
    Plain(PlainEntry<V>),
    Refreshable(RefreshableEntry<V>),
}

impl<V: Clone> CacheEntry<V> {
    /// Plain entry that goes stale `ttl` after creation.
    #[must_use]
    pub fn plain(value: V, ttl: Duration) -> Self {
        CacheEntry::Plain(PlainEntry::new(value, Some(ttl)))
    }

    /// Plain entry that never goes stale.
    #[must_use]
    pub fn permanent(value: V) -> Self {
        CacheEntry::Plain(PlainEntry::new(value, None))
    }

    pub fn refreshable<F>(value: V, ttl: Duration, refresher: F) -> Self
    where
        F: Fn() -> Result<V, RefreshError> + Send + Sync + 'static,
    {
        CacheEntry::Refreshable(RefreshableEntry::new(value, Some(ttl), refresher))
    }

    pub fn refreshable_with<R>(value: V, ttl: Duration, refresher: R) -> Self
    where
        R: Refresher<V> + 'static,
    {
        CacheEntry::Refreshable(RefreshableEntry::with_refresher(value, Some(ttl), refresher))
    }

    pub(crate) fn with_optional_ttl(value: V, ttl: Option<Duration>) -> Self {
        CacheEntry::Plain(PlainEntry::new(value, ttl))
    }

    /// Current value without side effects.
    #[must_use]
    pub fn value(&self) -> V {
        match self {
            CacheEntry::Plain(e) => e.value(),
            CacheEntry::Refreshable(e) => e.value(),
        }
    }

    /// Value as seen by a cache read: refreshable entries record the access.
    pub(crate) fn read(&self) -> V {
        match self {
            CacheEntry::Plain(e) => e.value(),
            CacheEntry::Refreshable(e) => e.touch_and_read(),
        }
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        match self {
            CacheEntry::Plain(e) => e.is_stale(),
            CacheEntry::Refreshable(e) => e.is_stale(),
        }
    }

    #[must_use]
    pub fn as_refreshable(&self) -> Option<&RefreshableEntry<V>> {
        match self {
            CacheEntry::Refreshable(e) => Some(e),
            CacheEntry::Plain(_) => None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> EntryKind {
        match self {
            CacheEntry::Plain(e) if e.ttl.is_none() => EntryKind::Permanent,
            CacheEntry::Plain(_) => EntryKind::Expirable,
            CacheEntry::Refreshable(_) => EntryKind::Refreshable,
        }
    }

    /// Point-in-time description of the entry. Does not count as a read.
    #[must_use]
    pub fn info(&self) -> EntryInfo {
        let now = Instant::now();
        let kind = self.kind();
        match self {
            CacheEntry::Plain(e) => EntryInfo {
                kind,
                created_at: e.created_wall,
                age_ms: ms(now.saturating_duration_since(e.created_at)),
                ttl_ms: e.ttl.map(ms),
                stale: e.is_stale_at(now),
                untouched: None,
                idle_ms: None,
                refresh_count: 0,
            },
            CacheEntry::Refreshable(e) => {
                let st = e.state.lock();
                EntryInfo {
                    kind,
                    created_at: e.created_wall,
                    age_ms: ms(now.saturating_duration_since(e.created_at)),
                    ttl_ms: e.ttl.map(ms),
                    stale: elapsed_reached(st.refreshed_at, e.ttl, now),
                    untouched: Some(st.untouched),
                    idle_ms: st.last_accessed_at.map(|t| ms(now.saturating_duration_since(t))),
                    refresh_count: st.refresh_count,
                }
            }
        }
    }
}

impl<V> fmt::Debug for CacheEntry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheEntry::Plain(e) => {
                f.debug_struct("Plain").field("ttl", &e.ttl).field("created_at", &e.created_wall).finish()
            }
            CacheEntry::Refreshable(e) => f
                .debug_struct("Refreshable")
                .field("ttl", &e.ttl)
                .field("created_at", &e.created_wall)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Expirable,
    Permanent,
    Refreshable,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryInfo {
    pub kind: EntryKind,
    pub created_at: DateTime<Utc>,
    pub age_ms: u64,
    pub ttl_ms: Option<u64>,
    pub stale: bool,
    pub untouched: Option<bool>,
    pub idle_ms: Option<u64>,
    pub refresh_count: u64,
}

fn ms(d: Duration) -> u64 {
    crate::cache::config::duration_to_ms(d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn plain_entry_goes_stale_at_ttl_boundary() {
        let e = PlainEntry::new("v", Some(Duration::from_millis(100)));
        let start = e.created_at;
        assert!(!e.is_stale_at(start + Duration::from_millis(99)));
        assert!(e.is_stale_at(start + Duration::from_millis(100)));
    }

    #[test]
    fn permanent_entry_never_stale() {
        let e = CacheEntry::permanent(7u32);
        assert_eq!(e.kind(), EntryKind::Permanent);
        match &e {
            CacheEntry::Plain(p) => assert!(!p.is_stale_at(Instant::now() + Duration::from_secs(86_400))),
            CacheEntry::Refreshable(_) => unreachable!(),
        }
    }

    #[test]
    fn touch_clears_untouched_but_not_staleness() {
        let e = RefreshableEntry::new(1u32, Some(Duration::from_millis(50)), || Ok(2u32));
        assert!(e.is_untouched());
        e.touch();
        assert!(!e.is_untouched());
        assert!(e.last_accessed_at().is_some());
        assert!(e.is_stale_at(Instant::now() + Duration::from_millis(60)));
    }

    #[test]
    fn refresh_installs_value_and_resets_state() {
        let counter = Arc::new(AtomicU64::new(0));
        let c = counter.clone();
        let e = RefreshableEntry::new(0u64, Some(Duration::from_millis(1)), move || {
            Ok(c.fetch_add(1, Ordering::SeqCst) + 10)
        });
        e.touch();
        std::thread::sleep(Duration::from_millis(5));
        assert!(e.is_stale());
        e.refresh().unwrap();
        assert_eq!(e.value(), 10);
        assert!(e.is_untouched(), "refresh is not a read");
        assert_eq!(e.refresh_count(), 1);
        let refreshed_at = e.state.lock().refreshed_at;
        assert!(!e.is_stale_at(refreshed_at));
    }

    #[test]
    fn read_during_refresh_survives_install() {
        use std::sync::mpsc;

        let (started_tx, started_rx) = mpsc::channel::<()>();
        let (go_tx, go_rx) = mpsc::channel::<()>();
        let go_rx = std::sync::Mutex::new(go_rx);
        let e = Arc::new(RefreshableEntry::new(1u32, Some(Duration::ZERO), move || {
            let _ = started_tx.send(());
            let _ = go_rx.lock().unwrap().recv();
            Ok(2u32)
        }));
        e.touch();

        let bg = Arc::clone(&e);
        let t = std::thread::spawn(move || bg.refresh());
        started_rx.recv().unwrap();
        assert_eq!(e.touch_and_read(), 1);
        go_tx.send(()).unwrap();
        t.join().unwrap().unwrap();

        assert_eq!(e.value(), 2);
        assert!(!e.is_untouched(), "read while refreshing must be kept");
    }

    #[test]
    fn failed_refresh_keeps_previous_value() {
        let e = RefreshableEntry::new("old".to_string(), Some(Duration::from_millis(10)), || {
            Err::<String, RefreshError>("backend down".into())
        });
        e.touch();
        let err = e.refresh().unwrap_err();
        assert_eq!(err.to_string(), "backend down");
        assert_eq!(e.value(), "old");
        assert!(!e.is_untouched());
        assert_eq!(e.refresh_count(), 0);
    }

    #[test]
    fn info_reports_kind_and_flags() {
        let e = CacheEntry::refreshable(1u8, Duration::from_secs(60), || Ok(1u8));
        let info = e.info();
        assert_eq!(info.kind, EntryKind::Refreshable);
        assert_eq!(info.untouched, Some(true));
        assert_eq!(info.idle_ms, None);
        assert!(!info.stale);
        assert_eq!(e.read(), 1);
        assert_eq!(e.info().untouched, Some(false));
    }
}
