//! Byte-bounded in-memory cache with LRU eviction.
//!
//! Lookups go through a concurrent hash map and never touch the recency
//! lock while a map guard is held. Every structural change (insert, replace,
//! evict, remove, clear) happens under the recency-list mutex, so the map and
//! the list always agree on which keys are live and `current_size_bytes`
//! never exceeds the configured maximum.

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::recency::{NodeId, RecencyList};
use super::types::CacheError;

/// Values whose memory footprint can be estimated up front.
pub trait SizeEstimate {
    /// Approximate number of bytes the value occupies.
    fn size_estimate(&self) -> u64;
}

impl SizeEstimate for Vec<u8> {
    fn size_estimate(&self) -> u64 {
        self.len() as u64
    }
}

impl<T: SizeEstimate + ?Sized> SizeEstimate for Arc<T> {
    fn size_estimate(&self) -> u64 {
        (**self).size_estimate()
    }
}

struct CacheEntry<V> {
    value: V,
    size_bytes: u64,
    /// Nanoseconds since the cache's epoch
    last_access: AtomicU64,
    node: NodeId,
}

/// Snapshot of memory cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryCacheStats {
    pub entry_count: usize,
    pub size_bytes: u64,
    pub max_size_bytes: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Values refused because they were larger than the whole cache
    pub rejected: u64,
}

impl MemoryCacheStats {
    /// Hit rate as a fraction in `[0.0, 1.0]`.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Thread-safe LRU cache bounded by the summed size of its values.
pub struct MemoryCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    recency: Mutex<RecencyList<K>>,
    max_size_bytes: u64,
    current_size_bytes: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    rejected: AtomicU64,
    epoch: Instant,
}

impl<K, V> MemoryCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone + SizeEstimate,
{
    /// Create a cache holding at most `max_size_bytes` of values.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::InvalidConfig` for a zero budget.
    pub fn new(max_size_bytes: u64) -> Result<Self, CacheError> {
        if max_size_bytes == 0 {
            return Err(CacheError::InvalidConfig(
                "memory cache size must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            entries: DashMap::new(),
            recency: Mutex::new(RecencyList::new()),
            max_size_bytes,
            current_size_bytes: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            epoch: Instant::now(),
        })
    }

    fn now_nanos(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    /// Look up a value, marking it most recently used.
    pub fn try_get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let (value, node) = match self.entries.get(key) {
            Some(entry) => {
                entry.last_access.store(self.now_nanos(), Ordering::Relaxed);
                (entry.value.clone(), entry.node)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        // The entry may have been evicted since the map lookup; the
        // generation check turns that into a no-op.
        self.recency.lock().promote(node);
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(value)
    }

    /// Read a value without touching recency or statistics.
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Insert or replace a value.
    ///
    /// Returns `false` without changing the cache when the value alone is
    /// larger than the cache.
    pub fn set(&self, key: K, value: V) -> bool {
        let size_bytes = value.size_estimate();
        if size_bytes > self.max_size_bytes {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            warn!(
                key = ?key,
                size_bytes,
                max_size_bytes = self.max_size_bytes,
                "Value exceeds memory cache size, not cached"
            );
            return false;
        }

        let mut recency = self.recency.lock();

        if let Some((_, previous)) = self.entries.remove(&key) {
            recency.remove(previous.node);
            self.current_size_bytes
                .fetch_sub(previous.size_bytes, Ordering::AcqRel);
        }

        let mut evicted = 0u64;
        while self.current_size_bytes.load(Ordering::Acquire) + size_bytes > self.max_size_bytes {
            let Some(victim) = recency.pop_back() else {
                break;
            };
            if let Some((_, entry)) = self.entries.remove(&victim) {
                self.current_size_bytes
                    .fetch_sub(entry.size_bytes, Ordering::AcqRel);
                evicted += 1;
                trace!(key = ?victim, size_bytes = entry.size_bytes, "Evicted LRU entry");
            }
        }

        let node = recency.push_front(key.clone());
        self.entries.insert(
            key,
            CacheEntry {
                value,
                size_bytes,
                last_access: AtomicU64::new(self.now_nanos()),
                node,
            },
        );
        self.current_size_bytes
            .fetch_add(size_bytes, Ordering::AcqRel);
        drop(recency);

        if evicted > 0 {
            self.evictions.fetch_add(evicted, Ordering::Relaxed);
        }
        true
    }

    /// Remove one entry. Returns whether it was present.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut recency = self.recency.lock();
        match self.entries.remove(key) {
            Some((_, entry)) => {
                recency.remove(entry.node);
                self.current_size_bytes
                    .fetch_sub(entry.size_bytes, Ordering::AcqRel);
                true
            }
            None => false,
        }
    }

    /// Drop every entry. Statistics are kept.
    pub fn clear(&self) {
        let mut recency = self.recency.lock();
        self.entries.clear();
        recency.clear();
        self.current_size_bytes.store(0, Ordering::Release);
    }

    /// Remove entries not accessed within `max_age`, regardless of LRU order.
    ///
    /// Returns the number of entries removed.
    pub fn evict_older_than(&self, max_age: Duration) -> usize {
        let threshold = self
            .now_nanos()
            .saturating_sub(max_age.as_nanos().min(u64::MAX as u128) as u64);

        let mut recency = self.recency.lock();
        let stale: Vec<K> = self
            .entries
            .iter()
            .filter(|entry| entry.last_access.load(Ordering::Relaxed) < threshold)
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for key in stale {
            // Re-check in case a reader touched the entry after the scan.
            let taken = self.entries.remove_if(&key, |_, entry| {
                entry.last_access.load(Ordering::Relaxed) < threshold
            });
            if let Some((_, entry)) = taken {
                recency.remove(entry.node);
                self.current_size_bytes
                    .fetch_sub(entry.size_bytes, Ordering::AcqRel);
                removed += 1;
            }
        }
        drop(recency);

        if removed > 0 {
            self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed, max_age_secs = max_age.as_secs(), "Evicted idle memory cache entries");
        }
        removed
    }

    /// Evict from the LRU tail until at or under `target_bytes`.
    pub fn trim_to_size(&self, target_bytes: u64) -> usize {
        let mut recency = self.recency.lock();
        let mut removed = 0;
        while self.current_size_bytes.load(Ordering::Acquire) > target_bytes {
            let Some(victim) = recency.pop_back() else {
                break;
            };
            if let Some((_, entry)) = self.entries.remove(&victim) {
                self.current_size_bytes
                    .fetch_sub(entry.size_bytes, Ordering::AcqRel);
                removed += 1;
            }
        }
        drop(recency);

        if removed > 0 {
            self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed, target_bytes, "Trimmed memory cache");
        }
        removed
    }

    /// Evict from the LRU tail until at or under `percent` of the maximum.
    pub fn trim_to_percent(&self, percent: u8) -> usize {
        let percent = u128::from(percent.min(100));
        let target = (u128::from(self.max_size_bytes) * percent / 100) as u64;
        self.trim_to_size(target)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Summed size of all entries. Never blocks.
    pub fn current_size_bytes(&self) -> u64 {
        self.current_size_bytes.load(Ordering::Acquire)
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Keys from most to least recently used.
    pub fn keys_by_recency(&self) -> Vec<K> {
        self.recency.lock().iter().cloned().collect()
    }

    pub fn statistics(&self) -> MemoryCacheStats {
        MemoryCacheStats {
            entry_count: self.entries.len(),
            size_bytes: self.current_size_bytes(),
            max_size_bytes: self.max_size_bytes,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }

    /// Zero the counters. Entries are untouched.
    pub fn reset_statistics(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.rejected.store(0, Ordering::Relaxed);
    }

    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        let recency = self.recency.lock();
        let mut total = 0;
        for entry in self.entries.iter() {
            total += entry.size_bytes;
            if recency.get(entry.node) != Some(entry.key()) {
                return false;
            }
        }
        recency.len() == self.entries.len() && total == self.current_size_bytes()
    }
}

impl<K: Eq + Hash, V> fmt::Debug for MemoryCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.entries.len())
            .field("current_size_bytes", &self.current_size_bytes.load(Ordering::Relaxed))
            .field("max_size_bytes", &self.max_size_bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::thread;

    fn bytes(n: usize) -> Vec<u8> {
        vec![0u8; n]
    }

    #[test]
    fn test_debug_reports_size() {
        let cache: MemoryCache<String, Vec<u8>> = MemoryCache::new(4096).unwrap();
        cache.set("a".to_string(), bytes(100));

        let debug = format!("{:?}", cache);
        assert!(debug.contains("entries: 1"));
        assert!(debug.contains("current_size_bytes: 100"));
        assert!(debug.contains("max_size_bytes: 4096"));
    }

    #[test]
    fn test_zero_budget_rejected() {
        let result = MemoryCache::<String, Vec<u8>>::new(0);
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }

    #[test]
    fn test_set_then_get() {
        let cache = MemoryCache::new(1024).unwrap();
        assert!(cache.set("a".to_string(), vec![1, 2, 3]));
        assert_eq!(cache.try_get("a"), Some(vec![1, 2, 3]));
        assert_eq!(cache.current_size_bytes(), 3);
        assert!(cache.is_consistent());
    }

    #[test]
    fn test_miss_counts() {
        let cache = MemoryCache::<String, Vec<u8>>::new(1024).unwrap();
        assert_eq!(cache.try_get("missing"), None);
        let stats = cache.statistics();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
    }

    #[test]
    fn test_second_insert_evicts_first() {
        let cache = MemoryCache::new(1536).unwrap();
        cache.set("a", bytes(1024));
        cache.set("b", bytes(1024));

        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert_eq!(cache.current_size_bytes(), 1024);
        assert_eq!(cache.statistics().evictions, 1);
    }

    #[test]
    fn test_access_protects_from_eviction() {
        let cache = MemoryCache::new(2500).unwrap();
        cache.set("a", bytes(1000));
        cache.set("b", bytes(1000));
        assert!(cache.try_get("a").is_some());
        cache.set("c", bytes(1000));

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert_eq!(cache.keys_by_recency(), vec!["c", "a"]);
        assert!(cache.is_consistent());
    }

    #[test]
    fn test_oversized_value_rejected() {
        let cache = MemoryCache::new(1024).unwrap();
        assert!(!cache.set("big", bytes(2048)));
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.current_size_bytes(), 0);
        assert_eq!(cache.statistics().rejected, 1);
    }

    #[test]
    fn test_oversized_value_leaves_existing_entries() {
        let cache = MemoryCache::new(1024).unwrap();
        cache.set("small", bytes(100));
        assert!(!cache.set("big", bytes(2048)));
        assert!(cache.contains("small"));
    }

    #[test]
    fn test_replace_subtracts_previous_size() {
        let cache = MemoryCache::new(1000).unwrap();
        cache.set("a", bytes(600));
        cache.set("a", bytes(700));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.current_size_bytes(), 700);
        assert_eq!(cache.statistics().evictions, 0);
        assert!(cache.is_consistent());
    }

    #[test]
    fn test_value_exactly_at_budget_fits() {
        let cache = MemoryCache::new(1024).unwrap();
        cache.set("a", bytes(10));
        assert!(cache.set("b", bytes(1024)));
        assert_eq!(cache.keys_by_recency(), vec!["b"]);
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = MemoryCache::new(1024).unwrap();
        cache.set("a", bytes(10));
        cache.set("b", bytes(20));

        assert!(cache.remove("a"));
        assert!(!cache.remove("a"));
        assert_eq!(cache.current_size_bytes(), 20);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.current_size_bytes(), 0);
        assert!(cache.is_consistent());
    }

    #[test]
    fn test_evict_older_than_removes_only_idle_entries() {
        let cache = MemoryCache::new(1024).unwrap();
        cache.set("old", bytes(10));
        cache.set("fresh", bytes(10));
        thread::sleep(Duration::from_millis(60));

        // Touch "old" so only "fresh" is idle, despite insertion order.
        cache.try_get("old");
        let removed = cache.evict_older_than(Duration::from_millis(30));

        assert_eq!(removed, 1);
        assert!(cache.contains("old"));
        assert!(!cache.contains("fresh"));
        assert!(cache.is_consistent());
    }

    #[test]
    fn test_evict_older_than_keeps_recent_entries() {
        let cache = MemoryCache::new(1024).unwrap();
        cache.set("a", bytes(10));
        assert_eq!(cache.evict_older_than(Duration::from_secs(3600)), 0);
        assert!(cache.contains("a"));
    }

    #[test]
    fn test_trim_to_percent() {
        let cache = MemoryCache::new(1000).unwrap();
        for key in ["a", "b", "c", "d"] {
            cache.set(key, bytes(250));
        }
        let removed = cache.trim_to_percent(50);

        assert_eq!(removed, 2);
        assert_eq!(cache.current_size_bytes(), 500);
        assert_eq!(cache.keys_by_recency(), vec!["d", "c"]);
    }

    #[test]
    fn test_trim_to_size_zero_empties_cache() {
        let cache = MemoryCache::new(1000).unwrap();
        cache.set("a", bytes(100));
        cache.set("b", bytes(100));
        assert_eq!(cache.trim_to_size(0), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_reset_statistics_keeps_entries() {
        let cache = MemoryCache::new(1024).unwrap();
        cache.set("a", bytes(10));
        cache.try_get("a");
        cache.try_get("b");
        cache.reset_statistics();

        let stats = cache.statistics();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.size_bytes, 10);
    }

    #[test]
    fn test_hit_rate() {
        let cache = MemoryCache::new(1024).unwrap();
        cache.set("a", bytes(1));
        cache.try_get("a");
        cache.try_get("a");
        cache.try_get("a");
        cache.try_get("z");
        assert!((cache.statistics().hit_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_peek_does_not_promote_or_count() {
        let cache = MemoryCache::new(2000).unwrap();
        cache.set("a", bytes(1000));
        cache.set("b", bytes(1000));
        assert!(cache.peek("a").is_some());
        cache.set("c", bytes(1000));

        assert!(!cache.contains("a"));
        assert_eq!(cache.statistics().hits, 0);
    }

    #[test]
    fn test_concurrent_access_stays_within_budget() {
        let cache = Arc::new(MemoryCache::new(10_000).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..500u64 {
                        let key = (t * 7 + i) % 64;
                        match i % 3 {
                            0 => {
                                cache.set(key, bytes(100 + (i as usize % 400)));
                            }
                            1 => {
                                cache.try_get(&key);
                            }
                            _ => {
                                cache.remove(&key);
                            }
                        }
                        assert!(cache.current_size_bytes() <= cache.max_size_bytes());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.is_consistent());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Set(u8, u16),
        Get(u8),
        Remove(u8),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..16, 0u16..3000).prop_map(|(k, s)| Op::Set(k, s)),
            (0u8..16).prop_map(Op::Get),
            (0u8..16).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn prop_size_never_exceeds_budget(
            max in 1u64..4096,
            ops in prop::collection::vec(op_strategy(), 0..150),
        ) {
            let cache = MemoryCache::new(max).unwrap();
            for op in ops {
                match op {
                    Op::Set(k, size) => {
                        let admitted = cache.set(k, bytes(size as usize));
                        prop_assert_eq!(admitted, size as u64 <= max);
                        if admitted {
                            prop_assert_eq!(cache.peek(&k).map(|v| v.len()), Some(size as usize));
                        }
                    }
                    Op::Get(k) => {
                        cache.try_get(&k);
                    }
                    Op::Remove(k) => {
                        cache.remove(&k);
                    }
                }
                prop_assert!(cache.current_size_bytes() <= cache.max_size_bytes());
                prop_assert!(cache.is_consistent());
            }
        }
    }
}
