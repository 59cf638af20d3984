use crate::core::geo::TileCoord;
use image::DynamicImage;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Bounded in-memory cache of decoded tiles with LRU eviction.
///
/// The ceiling is what keeps a long pan session from pinning every tile
/// ever decoded; the disk store below it is sized independently. The
/// cache carries no lock of its own: it lives inside the view state
/// behind the per-view reader-writer lock.
#[derive(Debug)]
pub struct TileMemoryCache {
    cache: LruCache<TileCoord, Arc<DynamicImage>>,
}

impl TileMemoryCache {
    /// Create a new tile cache with the given capacity
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(512).unwrap());
        Self {
            cache: LruCache::new(capacity),
        }
    }

    /// Get a tile, marking it as most recently used
    pub fn get(&mut self, coord: &TileCoord) -> Option<Arc<DynamicImage>> {
        self.cache.get(coord).cloned()
    }

    /// Insert a decoded tile
    pub fn insert(&mut self, coord: TileCoord, image: Arc<DynamicImage>) {
        self.cache.put(coord, image);
    }

    /// Check if a tile is cached without touching its recency
    pub fn contains(&self, coord: &TileCoord) -> bool {
        self.cache.contains(coord)
    }

    /// Get the current number of cached tiles
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Get cache capacity
    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile() -> Arc<DynamicImage> {
        Arc::new(DynamicImage::new_rgba8(1, 1))
    }

    #[test]
    fn test_basic_operations() {
        let mut cache = TileMemoryCache::new(4);
        let coord = TileCoord::new(1, 2, 3);

        assert!(cache.is_empty());
        cache.insert(coord, tile());
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&coord));
        assert!(cache.get(&coord).is_some());
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = TileMemoryCache::new(2);
        let coord1 = TileCoord::new(1, 1, 1);
        let coord2 = TileCoord::new(2, 2, 2);
        let coord3 = TileCoord::new(3, 3, 3);

        cache.insert(coord1, tile());
        cache.insert(coord2, tile());
        assert_eq!(cache.len(), 2);

        // Inserting a third tile evicts the least recently used
        cache.insert(coord3, tile());
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&coord1));
        assert!(cache.contains(&coord2));
        assert!(cache.contains(&coord3));
    }

    #[test]
    fn test_zero_capacity_falls_back() {
        let cache = TileMemoryCache::new(0);
        assert_eq!(cache.capacity(), 512);
    }
}
