//! The shard cache, built on the teacher's `cache::core::Cache` shape: an
//! `lru::LruCache` guarded by a lock, with atomic hit/miss/eviction
//! counters. `lru::LruCache` is built `unbounded()` and used purely as
//! the backing container; eviction itself is a manual scan that drops
//! the oldest clean shards, ordered by each shard's `last_accessed`
//! stamp, and never touches a dirty one.

use crate::errors::Result;
use crate::shard::Shard;
use lru::LruCache;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ShardCacheMetrics {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShardCacheMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl ShardCacheMetrics {
    fn snapshot(&self) -> ShardCacheMetricsSnapshot {
        ShardCacheMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

pub struct ShardCache {
    shards: Mutex<LruCache<u32, Shard>>,
    metrics: ShardCacheMetrics,
    max_cached: usize,
}

impl ShardCache {
    #[must_use]
    pub fn new(max_cached_shards: usize) -> Self {
        Self { shards: Mutex::new(LruCache::unbounded()), metrics: ShardCacheMetrics::default(), max_cached: max_cached_shards.max(1) }
    }

    /// Get-or-load shard `id`, bump its recency/access stamp, and run `f`
    /// against a mutable view (used by insert/update/delete).
    pub fn with_shard_mut<R>(
        &self,
        id: u32,
        loader: impl FnOnce() -> Result<Shard>,
        f: impl FnOnce(&mut Shard) -> R,
    ) -> Result<R> {
        let mut guard = self.shards.lock();
        if guard.get(&id).is_none() {
            guard.put(id, loader()?);
            self.metrics.misses.fetch_add(1, Ordering::Relaxed);
        } else {
            self.metrics.hits.fetch_add(1, Ordering::Relaxed);
        }
        let shard = guard.get_mut(&id).expect("just inserted or already present");
        shard.touch();
        Ok(f(shard))
    }

    /// Get-or-load shard `id`, bump its access stamp, and run `f` against a
    /// read-only view (used by `getOne`).
    pub fn with_shard<R>(
        &self,
        id: u32,
        loader: impl FnOnce() -> Result<Shard>,
        f: impl FnOnce(&Shard) -> R,
    ) -> Result<R> {
        self.with_shard_mut(id, loader, |s| f(s))
    }

    #[must_use]
    pub fn dirty_ids(&self) -> Vec<u32> {
        self.shards.lock().iter().filter(|(_, s)| s.dirty).map(|(id, _)| *id).collect()
    }

    pub fn mark_clean(&self, id: u32) {
        if let Some(shard) = self.shards.lock().get_mut(&id) {
            shard.dirty = false;
        }
    }

    pub fn remove(&self, id: u32) -> Option<Shard> {
        self.shards.lock().pop(&id)
    }

    /// After a flush, drop the oldest *clean* shards (ascending
    /// `last_accessed`) until the cache is back at or below its cap.
    /// Dirty shards are never evicted.
    pub fn evict_clean_to_cap(&self) {
        let mut guard = self.shards.lock();
        if guard.len() <= self.max_cached {
            return;
        }
        let mut candidates: Vec<(u32, u64)> =
            guard.iter().filter(|(_, s)| !s.dirty).map(|(id, s)| (*id, s.last_accessed)).collect();
        candidates.sort_by_key(|&(_, last_accessed)| last_accessed);

        let mut overflow = guard.len() - self.max_cached;
        for (id, _) in candidates {
            if overflow == 0 {
                break;
            }
            guard.pop(&id);
            overflow -= 1;
            self.metrics.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.shards.lock().clear();
    }

    #[must_use]
    pub fn metrics_snapshot(&self) -> ShardCacheMetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_once_then_hits_cache() {
        let cache = ShardCache::new(10);
        let mut loads = 0;
        for _ in 0..3 {
            cache
                .with_shard(0, || {
                    loads += 1;
                    Ok(Shard::new(0))
                }, |_| ())
                .unwrap();
        }
        assert_eq!(loads, 1);
        assert_eq!(cache.metrics_snapshot().hits, 2);
        assert_eq!(cache.metrics_snapshot().misses, 1);
    }

    #[test]
    fn eviction_never_drops_dirty_shards() {
        let cache = ShardCache::new(1);
        cache.with_shard_mut(0, || Ok(Shard::new(0)), |s| s.dirty = true).unwrap();
        cache.with_shard_mut(1, || Ok(Shard::new(1)), |_| ()).unwrap();
        cache.evict_clean_to_cap();
        assert_eq!(cache.len(), 1);
        assert!(cache.with_shard(0, || panic!("shard 0 must still be cached"), |s| s.id).is_ok());
    }
}
