//! Short-lived read-through response cache
//!
//! Responses are keyed by the full request parameters and expire after a
//! fixed lifetime. Expired entries are evicted when they are looked up, and
//! [`CachedSource`] purges every expired entry before each insert, so the
//! cache never holds more than one TTL's worth of distinct queries. All
//! access happens on one thread, so the cache sits in a `RefCell` with no
//! locking.

use core::cell::RefCell;
use core::hash::Hash;
use core::time::Duration;
use std::collections::HashMap;
use std::time::Instant;

use log::debug;

use crate::model::Measurement;
use crate::source::{FetchResult, MeasurementQuery, MeasurementSource};

use super::clock::Clock;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Time-expired map of responses
#[derive(Debug, Clone)]
pub struct ResponseCache<K, V> {
    ttl: Duration,
    entries: HashMap<K, CacheEntry<V>>,
}

impl<K: Eq + Hash, V: Clone> ResponseCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Cached value for `key`, evicting it if it has expired
    pub fn get(&mut self, key: &K, now: Instant) -> Option<V> {
        match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&mut self, key: K, value: V, now: Instant) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// [`MeasurementSource`] wrapper that serves repeated queries from a cache.
///
/// Only successful responses are cached, including empty ones.
pub struct CachedSource<S, C> {
    inner: S,
    clock: C,
    cache: RefCell<ResponseCache<MeasurementQuery, Vec<Measurement>>>,
}

impl<S: MeasurementSource, C: Clock> CachedSource<S, C> {
    pub fn new(inner: S, clock: C, ttl: Duration) -> Self {
        Self {
            inner,
            clock,
            cache: RefCell::new(ResponseCache::new(ttl)),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of responses currently held, expired or not
    pub fn cached_entries(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Forget every cached response, e.g. after a manual refresh
    pub fn invalidate(&self) {
        self.cache.borrow_mut().clear();
    }
}

impl<S: MeasurementSource, C: Clock> MeasurementSource for CachedSource<S, C> {
    async fn measurements(&self, query: &MeasurementQuery) -> FetchResult<Vec<Measurement>> {
        let cached = self.cache.borrow_mut().get(query, self.clock.now());
        if let Some(rows) = cached {
            debug!("Cache hit for {:?} ({} rows)", query, rows.len());
            return Ok(rows);
        }

        let rows = self.inner.measurements(query).await?;

        let now = self.clock.now();
        let mut cache = self.cache.borrow_mut();
        let purged = cache.purge_expired(now);
        if purged > 0 {
            debug!("Purged {} expired responses", purged);
        }
        cache.insert(query.clone(), rows.clone(), now);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use embassy_futures::block_on;

    use super::*;
    use crate::coordination::ManualClock;
    use crate::model::NodeId;
    use crate::model::fixtures::*;
    use crate::source::FetchError;

    const TTL: Duration = Duration::from_secs(300);

    struct CountingSource {
        calls: Cell<usize>,
        fail: Cell<bool>,
    }

    impl MeasurementSource for CountingSource {
        async fn measurements(&self, _query: &MeasurementQuery) -> FetchResult<Vec<Measurement>> {
            self.calls.set(self.calls.get() + 1);
            if self.fail.get() {
                return Err(FetchError::Timeout);
            }
            Ok(vec![reading(1, 1, origin(), 1.0)])
        }
    }

    fn counting() -> CountingSource {
        CountingSource {
            calls: Cell::new(0),
            fail: Cell::new(false),
        }
    }

    #[test]
    fn test_entries_expire() {
        let clock = ManualClock::new(origin());
        let mut cache = ResponseCache::new(TTL);
        cache.insert("a", 1, clock.now());

        clock.advance(Duration::from_secs(299));
        assert_eq!(cache.get(&"a", clock.now()), Some(1));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get(&"a", clock.now()), None, "expired exactly at the ttl");
        assert!(cache.is_empty(), "expired entry evicted on lookup");
    }

    #[test]
    fn test_purge_expired() {
        let clock = ManualClock::new(origin());
        let mut cache = ResponseCache::new(TTL);
        cache.insert(1, "old", clock.now());
        clock.advance(Duration::from_secs(200));
        cache.insert(2, "new", clock.now());
        clock.advance(Duration::from_secs(200));

        assert_eq!(cache.purge_expired(clock.now()), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_read_through_hits_cache() {
        let clock = ManualClock::new(origin());
        let source = CachedSource::new(counting(), &clock, TTL);
        let query = MeasurementQuery::for_node(NodeId(1));

        block_on(source.measurements(&query)).unwrap();
        block_on(source.measurements(&query)).unwrap();
        assert_eq!(source.inner().calls.get(), 1);

        let other = MeasurementQuery::for_node(NodeId(2));
        block_on(source.measurements(&other)).unwrap();
        assert_eq!(source.inner().calls.get(), 2, "different parameters miss");

        clock.advance(TTL);
        block_on(source.measurements(&query)).unwrap();
        assert_eq!(source.inner().calls.get(), 3, "expired entry refetched");
    }

    #[test]
    fn test_errors_are_not_cached() {
        let clock = ManualClock::new(origin());
        let source = CachedSource::new(counting(), &clock, TTL);
        let query = MeasurementQuery::for_node(NodeId(1));

        source.inner().fail.set(true);
        assert!(block_on(source.measurements(&query)).is_err());

        source.inner().fail.set(false);
        assert_eq!(block_on(source.measurements(&query)).unwrap().len(), 1);
        assert_eq!(source.inner().calls.get(), 2);
    }

    #[test]
    fn test_insert_purges_expired_entries() {
        let clock = ManualClock::new(origin());
        let source = CachedSource::new(counting(), &clock, TTL);

        for node in 0..3 {
            block_on(source.measurements(&MeasurementQuery::for_node(NodeId(node)))).unwrap();
        }
        assert_eq!(source.cached_entries(), 3);

        clock.advance(TTL);
        block_on(source.measurements(&MeasurementQuery::for_node(NodeId(9)))).unwrap();
        assert_eq!(source.cached_entries(), 1, "expired queries never looked up again are dropped");
    }
}
