//! Bounded thumbnail cache keyed by media path.
//!
//! Entries can disappear at any time (LRU eviction, explicit eviction on
//! delete), so callers always recompute on a miss.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use image::DynamicImage;
use lru::LruCache;

const FALLBACK_CAPACITY: NonZeroUsize = match NonZeroUsize::new(64) {
    Some(n) => n,
    None => unreachable!(),
};

pub struct ThumbnailCache {
    inner: Mutex<LruCache<String, Arc<DynamicImage>>>,
}

impl ThumbnailCache {
    /// Create a cache holding at most `capacity` thumbnails. A zero
    /// capacity falls back to 64.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(FALLBACK_CAPACITY);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    // The lock is never held across an await point.
    fn lock(&self) -> MutexGuard<'_, LruCache<String, Arc<DynamicImage>>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, path: &str) -> Option<Arc<DynamicImage>> {
        self.lock().get(path).cloned()
    }

    pub fn insert(&self, path: String, image: Arc<DynamicImage>) {
        self.lock().put(path, image);
    }

    pub fn remove(&self, path: &str) -> Option<Arc<DynamicImage>> {
        self.lock().pop(path)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn img(w: u32) -> Arc<DynamicImage> {
        Arc::new(DynamicImage::new_rgb8(w, 1))
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = ThumbnailCache::new(2);
        cache.insert("a".into(), img(1));
        cache.insert("b".into(), img(2));
        assert!(cache.get("a").is_some());
        cache.insert("c".into(), img(3));

        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_zero_capacity_falls_back() {
        let cache = ThumbnailCache::new(0);
        cache.insert("a".into(), img(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = ThumbnailCache::new(4);
        cache.insert("a".into(), img(1));
        cache.insert("b".into(), img(1));
        assert!(cache.remove("a").is_some());
        assert!(cache.remove("a").is_none());
        cache.clear();
        assert!(cache.is_empty());
    }
}
