//! LRU cache for rendered page rasters

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use super::geometry::{PageViewport, Rotation};
use crate::document::RasterSurface;

/// Cache key for rendered pages
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub page: usize,
    /// Scale factor stored as millionths for stable hashing
    pub scale_millionths: u32,
    pub rotation: Rotation,
}

impl CacheKey {
    #[must_use]
    pub fn new(page: usize, viewport: &PageViewport) -> Self {
        Self {
            page,
            scale_millionths: (viewport.scale * 1_000_000.0).round() as u32,
            rotation: viewport.rotation,
        }
    }
}

/// LRU cache of successfully rendered rasters. Failures are never stored.
pub struct PageCache {
    cache: LruCache<CacheKey, Arc<RasterSurface>>,
}

impl PageCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Get a cached raster, promoting it in the LRU order
    #[must_use]
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<RasterSurface>> {
        self.cache.get(key).cloned()
    }

    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.cache.contains(key)
    }

    pub fn insert(&mut self, key: CacheKey, surface: RasterSurface) -> Arc<RasterSurface> {
        let arc = Arc::new(surface);
        self.cache.put(key, arc.clone());
        arc
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
