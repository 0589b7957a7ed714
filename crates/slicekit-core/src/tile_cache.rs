//! Consumer-side tile cache with dirty-region invalidation.

use crate::error::RequestError;
use crate::request::Request;
use crate::slicing::Slicing;
use crate::source::{Source, SubscriptionId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Value type produced by a source's requests.
pub type TileOf<S> = <<S as Source>::Request as Request>::Output;

/// Tile cache configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileCacheConfig {
    /// Maximum number of cached tiles. Zero disables caching.
    pub capacity: usize,
}

impl Default for TileCacheConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

impl TileCacheConfig {
    #[must_use]
    pub const fn with_capacity(capacity: usize) -> Self {
        Self { capacity }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Tiles dropped to stay within capacity.
    pub evictions: u64,
    /// Tiles dropped because their region went dirty.
    pub invalidations: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Cached keys shared with the dirty listener.
///
/// `stale` is a subset of `keys`, and `keys` holds the cached tiles plus at
/// most the one being fetched, so neither grows past the cache capacity no
/// matter how many regions go dirty between accesses.
#[derive(Debug, Default)]
struct Tracked {
    keys: HashSet<Slicing>,
    stale: HashSet<Slicing>,
}

impl Tracked {
    fn mark_dirty(&mut self, region: &Slicing) {
        self.stale
            .extend(self.keys.iter().filter(|key| key.intersects(region)).cloned());
    }

    fn forget(&mut self, key: &Slicing) {
        self.keys.remove(key);
        self.stale.remove(key);
    }
}

type SharedTracked = Arc<Mutex<Tracked>>;

fn lock_tracked(tracked: &SharedTracked) -> MutexGuard<'_, Tracked> {
    tracked.lock().unwrap_or_else(PoisonError::into_inner)
}

/// LRU cache of tiles fetched from a [`Source`].
///
/// The cache listens on the source's dirty signal. The listener marks every
/// cached tile intersecting a dirty region as stale; stale tiles are never
/// served and are evicted on the next access.
pub struct TileCache<S: Source> {
    source: Arc<S>,
    config: TileCacheConfig,
    tiles: HashMap<Slicing, TileOf<S>>,
    /// Least recently used first.
    access_order: Vec<Slicing>,
    tracked: SharedTracked,
    subscription: SubscriptionId,
    stats: CacheStats,
}

impl<S: Source> TileCache<S> {
    pub fn new(source: Arc<S>, config: TileCacheConfig) -> Self {
        let tracked: SharedTracked = Arc::default();
        let listener = Arc::clone(&tracked);
        let subscription = source
            .dirty_signal()
            .subscribe(move |region| lock_tracked(&listener).mark_dirty(region));
        Self {
            source,
            config,
            tiles: HashMap::new(),
            access_order: Vec::new(),
            tracked,
            subscription,
            stats: CacheStats::default(),
        }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    pub const fn config(&self) -> &TileCacheConfig {
        &self.config
    }

    pub const fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Whether a fresh tile for exactly `slicing` is cached.
    pub fn contains(&self, slicing: &Slicing) -> bool {
        self.tiles.contains_key(slicing) && !lock_tracked(&self.tracked).stale.contains(slicing)
    }

    /// Number of fresh tiles.
    pub fn len(&self) -> usize {
        let tracked = lock_tracked(&self.tracked);
        self.tiles
            .keys()
            .filter(|key| !tracked.stale.contains(*key))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached tile intersecting `region`. Returns how many went.
    pub fn invalidate(&mut self, region: &Slicing) -> usize {
        self.apply_dirty();
        self.evict_intersecting(region)
    }

    pub fn clear(&mut self) {
        let mut tracked = lock_tracked(&self.tracked);
        tracked.keys.clear();
        tracked.stale.clear();
        drop(tracked);
        self.tiles.clear();
        self.access_order.clear();
    }

    fn apply_dirty(&mut self) {
        let stale = {
            let mut tracked = lock_tracked(&self.tracked);
            let stale = std::mem::take(&mut tracked.stale);
            tracked.keys.retain(|key| !stale.contains(key));
            stale
        };
        if stale.is_empty() {
            return;
        }
        let before = self.tiles.len();
        self.tiles.retain(|key, _| !stale.contains(key));
        self.access_order.retain(|key| !stale.contains(key));
        let removed = before - self.tiles.len();
        debug!(removed, "evicted stale tiles");
        self.stats.invalidations += removed as u64;
    }

    fn evict_intersecting(&mut self, region: &Slicing) -> usize {
        let before = self.tiles.len();
        self.tiles.retain(|key, _| !key.intersects(region));
        self.access_order.retain(|key| !key.intersects(region));
        let mut tracked = lock_tracked(&self.tracked);
        tracked.keys.retain(|key| !key.intersects(region));
        tracked.stale.retain(|key| !key.intersects(region));
        drop(tracked);
        let removed = before - self.tiles.len();
        if removed > 0 {
            debug!(%region, removed, "invalidated cached tiles");
        }
        self.stats.invalidations += removed as u64;
        removed
    }

    fn touch(&mut self, slicing: &Slicing) {
        if let Some(pos) = self.access_order.iter().position(|key| key == slicing) {
            let key = self.access_order.remove(pos);
            self.access_order.push(key);
        }
    }

    fn insert(&mut self, slicing: Slicing, tile: TileOf<S>) {
        if self.config.capacity == 0 {
            lock_tracked(&self.tracked).forget(&slicing);
            return;
        }
        if self.tiles.insert(slicing.clone(), tile).is_some() {
            self.touch(&slicing);
            return;
        }
        self.access_order.push(slicing);
        while self.tiles.len() > self.config.capacity && !self.access_order.is_empty() {
            let oldest = self.access_order.remove(0);
            self.tiles.remove(&oldest);
            lock_tracked(&self.tracked).forget(&oldest);
            self.stats.evictions += 1;
        }
    }
}

impl<S> TileCache<S>
where
    S: Source,
    TileOf<S>: Clone,
{
    /// Return the tile for `slicing`, fetching and waiting on a miss.
    ///
    /// A region that goes dirty while the fetch is in flight leaves the
    /// fetched tile stale, so it is refetched on the next access.
    pub fn get(&mut self, slicing: &Slicing) -> Result<TileOf<S>, RequestError> {
        self.apply_dirty();
        if let Some(tile) = self.tiles.get(slicing) {
            let tile = tile.clone();
            self.touch(slicing);
            self.stats.hits += 1;
            return Ok(tile);
        }
        self.stats.misses += 1;
        lock_tracked(&self.tracked).keys.insert(slicing.clone());
        let fetched = self
            .source
            .request(slicing)
            .map_err(RequestError::from)
            .and_then(|request| request.wait());
        match fetched {
            Ok(tile) => {
                self.insert(slicing.clone(), tile.clone());
                Ok(tile)
            }
            Err(err) => {
                lock_tracked(&self.tracked).forget(slicing);
                Err(err)
            }
        }
    }
}

impl<S: Source> Drop for TileCache<S> {
    fn drop(&mut self) {
        self.source.dirty_signal().unsubscribe(self.subscription);
    }
}

impl<S: Source> fmt::Debug for TileCache<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileCache")
            .field("config", &self.config)
            .field("tiles", &self.tiles.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::sources::{ArraySource, ConstantSource, LazySource};
    use ndarray::{ArrayD, IxDyn};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn region(ranges: [std::ops::Range<usize>; 2]) -> Slicing {
        ranges.into_iter().collect()
    }

    fn counting_source(calls: &Arc<AtomicUsize>) -> Arc<LazySource> {
        let calls = Arc::clone(calls);
        Arc::new(LazySource::new([16, 16], move |s: &Slicing| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(ArrayD::zeros(IxDyn(&s.shape())))
        }))
    }

    #[test]
    fn test_second_get_is_a_hit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut cache = TileCache::new(counting_source(&calls), TileCacheConfig::default());
        let tile = region([0..4, 0..4]);
        cache.get(&tile).expect("fetch");
        cache.get(&tile).expect("cached");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
        assert!((cache.stats().hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_dirty_region_evicts_only_intersecting_tiles() {
        let source = Arc::new(ArraySource::new(ArrayD::zeros(IxDyn(&[8, 8]))));
        let mut cache = TileCache::new(Arc::clone(&source), TileCacheConfig::default());
        let (a, b, c) = (region([0..4, 0..4]), region([0..4, 4..8]), region([4..8, 0..8]));
        for tile in [&a, &b, &c] {
            cache.get(tile).expect("fetch");
        }
        assert_eq!(cache.len(), 3);

        source.set_dirty(&region([2..3, 5..6]));
        assert!(cache.contains(&a));
        assert!(!cache.contains(&b));
        assert!(cache.contains(&c));
        assert_eq!(cache.len(), 2);

        // Next access applies the queued invalidation.
        cache.get(&a).expect("cached");
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[test]
    fn test_empty_dirty_region_keeps_tiles() {
        let source = Arc::new(ArraySource::new(ArrayD::zeros(IxDyn(&[8, 8]))));
        let mut cache = TileCache::new(Arc::clone(&source), TileCacheConfig::default());
        let tile = region([0..5, 0..7]);
        cache.get(&tile).expect("fetch");

        source.set_dirty(&region([0..1, 6..6]));
        assert!(cache.contains(&tile));
        cache.get(&tile).expect("still cached");
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().invalidations, 0);
    }

    #[test]
    fn test_idle_cache_dirty_backlog_is_bounded() {
        let source = Arc::new(ArraySource::new(ArrayD::zeros(IxDyn(&[64, 64]))));
        let mut cache = TileCache::new(Arc::clone(&source), TileCacheConfig::default());
        let (a, b) = (region([0..8, 0..8]), region([32..40, 32..40]));
        cache.get(&a).expect("a");
        cache.get(&b).expect("b");

        for i in 0..1000 {
            let row = i % 64;
            source.set_dirty(&region([row..row + 1, 0..4]));
        }
        {
            let tracked = lock_tracked(&cache.tracked);
            assert_eq!(tracked.keys.len(), 2);
            assert_eq!(tracked.stale.len(), 1);
        }
        assert!(!cache.contains(&a));
        assert!(cache.contains(&b));

        cache.get(&b).expect("hit");
        assert_eq!(cache.stats().invalidations, 1);
        assert!(lock_tracked(&cache.tracked).stale.is_empty());
    }

    #[test]
    fn test_failed_fetch_is_not_tracked() {
        let source = Arc::new(ConstantSource::new(1.0, [4, 4]));
        let mut cache = TileCache::new(source, TileCacheConfig::default());
        cache.get(&region([0..5, 0..1])).expect_err("out of bounds");
        assert!(lock_tracked(&cache.tracked).keys.is_empty());
    }

    #[test]
    fn test_write_refreshes_cached_tile() {
        let source = Arc::new(ArraySource::new(ArrayD::zeros(IxDyn(&[4, 4]))));
        let mut cache = TileCache::new(Arc::clone(&source), TileCacheConfig::default());
        let whole = Slicing::from_shape(&[4, 4]);
        assert_eq!(cache.get(&whole).expect("fetch").sum(), 0.0);

        source
            .write(&region([0..1, 0..1]), ArrayD::from_elem(IxDyn(&[1, 1]), 3.0).view())
            .expect("write");
        assert_eq!(cache.get(&whole).expect("refetch").sum(), 3.0);
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut cache = TileCache::new(counting_source(&calls), TileCacheConfig::with_capacity(2));
        let (a, b, c) = (region([0..1, 0..1]), region([1..2, 0..1]), region([2..3, 0..1]));
        cache.get(&a).expect("a");
        cache.get(&b).expect("b");
        cache.get(&a).expect("a again");
        cache.get(&c).expect("c evicts b");
        assert!(cache.contains(&a));
        assert!(!cache.contains(&b));
        assert!(cache.contains(&c));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_zero_capacity_disables_caching() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut cache = TileCache::new(counting_source(&calls), TileCacheConfig::with_capacity(0));
        let tile = region([0..2, 0..2]);
        cache.get(&tile).expect("fetch");
        cache.get(&tile).expect("fetch again");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_errors_are_not_cached() {
        let source = Arc::new(ConstantSource::new(1.0, [4, 4]));
        let mut cache = TileCache::new(source, TileCacheConfig::default());
        let err = cache.get(&region([0..5, 0..1])).expect_err("out of bounds");
        assert!(matches!(
            err,
            RequestError::Source(SourceError::OutOfBounds { axis: 0, .. })
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_drop_unsubscribes() {
        let source = Arc::new(ConstantSource::new(1.0, [4]));
        let cache = TileCache::new(Arc::clone(&source), TileCacheConfig::default());
        assert_eq!(source.dirty_signal().len(), 1);
        drop(cache);
        assert!(source.dirty_signal().is_empty());
    }

    #[test]
    fn test_config_from_json_uses_defaults() {
        let config: TileCacheConfig = serde_json::from_str("{}").expect("parse");
        assert_eq!(config, TileCacheConfig::default());
        let config: TileCacheConfig = serde_json::from_str(r#"{"capacity": 8}"#).expect("parse");
        assert_eq!(config.capacity, 8);
    }
}
