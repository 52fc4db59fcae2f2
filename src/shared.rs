//! Shared range index with hot reload support.
//!
//! This module provides a range index holder with:
//! - Lock-free concurrent lookups
//! - Atomic whole-index replacement
//! - Optional LRU cache of containment results

use arc_swap::ArcSwap;
use quick_cache::sync::Cache;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::index::{Interval, RangeIndex};

/// A built index and the generation it was installed as.
#[derive(Debug)]
struct Snapshot {
    generation: u64,
    index: RangeIndex,
}

/// Range index shared between threads.
///
/// Lookups read the current snapshot without locking. [`SharedIndex::replace`]
/// swaps in a completed index; lookups already running finish against the
/// old one.
///
/// # Example
///
/// ```
/// use ip2asn::index::{ColumnMap, Interval, RangeIndex};
/// use ip2asn::SharedIndex;
///
/// let index = RangeIndex::from_parts(
///     vec![Interval::new(16843008, 16843263, "13335", "US", "CLOUDFLARENET")],
///     ColumnMap::default(),
/// );
/// let shared = SharedIndex::with_capacity(index, 1000);
/// assert_eq!(shared.lookup_containing(16843009).unwrap().asn, "13335");
///
/// shared.replace(RangeIndex::default());
/// assert!(shared.lookup_containing(16843009).is_none());
/// ```
pub struct SharedIndex {
    /// Current snapshot, wrapped in ArcSwap for atomic replacement.
    inner: ArcSwap<Snapshot>,
    /// LRU cache keyed by (generation, address).
    cache: Option<Cache<(u64, u128), Option<Interval>>>,
    /// Configured cache capacity.
    capacity: usize,
    /// Generation counter, bumped on each replacement.
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SharedIndex {
    /// Share an index without a query cache.
    pub fn new(index: RangeIndex) -> Self {
        Self::with_capacity(index, 0)
    }

    /// Share an index with a query cache of `capacity` entries.
    ///
    /// A capacity of 0 disables the cache.
    pub fn with_capacity(index: RangeIndex, capacity: usize) -> Self {
        let cache = if capacity > 0 {
            Some(Cache::new(capacity))
        } else {
            None
        };

        Self {
            inner: ArcSwap::from_pointee(Snapshot {
                generation: 0,
                index,
            }),
            cache,
            capacity,
            generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Atomically replace the index.
    ///
    /// Cached results of the previous index are dropped.
    pub fn replace(&self, index: RangeIndex) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let rows = index.len();
        self.inner.store(Arc::new(Snapshot { generation, index }));

        if let Some(ref cache) = self.cache {
            cache.clear();
        }

        log::info!("Replaced range index ({} rows, generation {})", rows, generation);
    }

    /// Find the range containing `address`.
    pub fn lookup_containing(&self, address: u128) -> Option<Interval> {
        let snapshot = self.inner.load();
        let key = (snapshot.generation, address);

        if let Some(ref cache) = self.cache {
            if let Some(result) = cache.get(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return result;
            }
            self.misses.fetch_add(1, Ordering::Relaxed);
        }

        let result = snapshot.index.lookup_containing(address).cloned();

        if let Some(ref cache) = self.cache {
            cache.insert(key, result.clone());
        }

        result
    }

    /// Find all ranges announced by `asn`, in stored order.
    pub fn lookup_by_asn<A: Display>(&self, asn: A, limit: Option<usize>) -> Vec<Interval> {
        self.inner
            .load()
            .index
            .lookup_by_asn(asn, limit)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Run `f` against the current index.
    pub fn with_index<T>(&self, f: impl FnOnce(&RangeIndex) -> T) -> T {
        f(&self.inner.load().index)
    }

    /// Number of ranges in the current index.
    pub fn len(&self) -> usize {
        self.inner.load().index.len()
    }

    /// Whether the current index is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the current generation (incremented on each replacement).
    pub fn generation(&self) -> u64 {
        self.inner.load().generation
    }

    /// Clear the query cache.
    pub fn clear_cache(&self) {
        if let Some(ref cache) = self.cache {
            cache.clear();
        }
    }

    /// Get cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        match self.cache {
            Some(ref cache) => CacheStats {
                capacity: self.capacity,
                len: cache.len(),
                enabled: true,
                hits,
                misses,
            },
            None => CacheStats::default(),
        }
    }
}

/// Query cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Maximum cache capacity.
    pub capacity: usize,
    /// Current number of entries in the cache.
    pub len: usize,
    /// Whether caching is enabled.
    pub enabled: bool,
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that went to the index.
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of lookups answered from the cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ColumnMap;

    fn create_test_index(asn: &str) -> RangeIndex {
        RangeIndex::from_parts(
            vec![
                Interval::new(16777216, 16777471, asn, "US", "CLOUDFLARENET"),
                Interval::new(16843008, 16843263, asn, "US", "CLOUDFLARENET"),
            ],
            ColumnMap::default(),
        )
    }

    #[test]
    fn test_shared_lookup() {
        let shared = SharedIndex::new(create_test_index("13335"));
        assert_eq!(shared.len(), 2);
        assert_eq!(shared.lookup_containing(16843009).unwrap().asn, "13335");
        assert!(shared.lookup_containing(16843264).is_none());
        assert_eq!(shared.lookup_by_asn(13335, Some(1)).len(), 1);
    }

    #[test]
    fn test_cache_hit() {
        let shared = SharedIndex::with_capacity(create_test_index("13335"), 100);

        // First call - cache miss
        let _ = shared.lookup_containing(16843009);
        assert_eq!(shared.cache_stats().len, 1);

        // Second call - cache hit
        let _ = shared.lookup_containing(16843009);
        let stats = shared.cache_stats();
        assert_eq!(stats.len, 1);
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_misses_are_cached() {
        let shared = SharedIndex::with_capacity(create_test_index("13335"), 100);
        assert!(shared.lookup_containing(1).is_none());
        assert!(shared.lookup_containing(1).is_none());
        assert_eq!(shared.cache_stats().hits, 1);
    }

    #[test]
    fn test_replace() {
        let shared = SharedIndex::with_capacity(create_test_index("13335"), 100);
        assert_eq!(shared.lookup_containing(16843009).unwrap().asn, "13335");
        assert_eq!(shared.generation(), 0);

        shared.replace(create_test_index("64500"));

        assert_eq!(shared.generation(), 1);
        assert_eq!(shared.lookup_containing(16843009).unwrap().asn, "64500");
    }

    #[test]
    fn test_cache_clear_on_replace() {
        let shared = SharedIndex::with_capacity(create_test_index("13335"), 100);
        let _ = shared.lookup_containing(16843009);
        let _ = shared.lookup_containing(16777217);
        assert_eq!(shared.cache_stats().len, 2);

        shared.replace(create_test_index("13335"));
        assert_eq!(shared.cache_stats().len, 0);
    }

    #[test]
    fn test_no_cache() {
        let shared = SharedIndex::new(create_test_index("13335"));
        let _ = shared.lookup_containing(16843009);
        let stats = shared.cache_stats();
        assert!(!stats.enabled);
        assert_eq!(stats, CacheStats::default());
    }

    #[test]
    fn test_concurrent_readers() {
        let shared = Arc::new(SharedIndex::with_capacity(create_test_index("13335"), 1000));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || {
                    for i in 0..256u128 {
                        let hit = shared.lookup_containing(16843008 + i).unwrap();
                        assert_eq!(hit.start, 16843008);
                    }
                    t
                })
            })
            .collect();

        shared.replace(create_test_index("13335"));
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
