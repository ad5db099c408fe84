use lru::LruCache;
use std::sync::{Mutex, PoisonError};

use super::ImageCache;
use crate::bitmap::{SharedImage, byte_size};

struct Inner {
    entries: LruCache<String, SharedImage>,
    size: u64,
}

/// In-memory LRU cache bounded by total pixel bytes
pub struct MemoryCache {
    inner: Mutex<Inner>,
    max_size: u64,
}

impl MemoryCache {
    pub fn new(max_size: u64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::unbounded(),
                size: 0,
            }),
            max_size,
        }
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ImageCache for MemoryCache {
    fn get(&self, key: &str) -> Option<SharedImage> {
        self.lock().entries.get(key).cloned()
    }

    fn put(&self, key: &str, image: SharedImage) {
        let size = byte_size(&image);
        let mut inner = self.lock();

        if let Some(previous) = inner.entries.pop(key) {
            inner.size -= byte_size(&previous);
        }
        // Too big to ever fit
        if size > self.max_size {
            return;
        }

        inner.entries.put(key.to_string(), image);
        inner.size += size;

        while inner.size > self.max_size {
            match inner.entries.pop_lru() {
                Some((_, evicted)) => inner.size -= byte_size(&evicted),
                None => break,
            }
        }
    }

    fn len(&self) -> usize {
        self.lock().entries.len()
    }

    fn size_bytes(&self) -> u64 {
        self.lock().size
    }

    fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.size = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::solid;
    use std::sync::Arc;

    // solid() images are RGBA8: 4 bytes per pixel
    const TEN_BY_TEN: u64 = 10 * 10 * 4;

    #[test]
    fn test_get_put() {
        let cache = MemoryCache::new(1024 * 1024);
        let image = solid(10, 10);
        cache.put("a", image.clone());

        assert!(Arc::ptr_eq(&cache.get("a").unwrap(), &image));
        assert!(cache.get("b").is_none());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.size_bytes(), TEN_BY_TEN);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = MemoryCache::new(TEN_BY_TEN * 2);
        cache.put("a", solid(10, 10));
        cache.put("b", solid(10, 10));
        cache.get("a");
        cache.put("c", solid(10, 10));

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.size_bytes(), TEN_BY_TEN * 2);
    }

    #[test]
    fn test_replacing_key_updates_size() {
        let cache = MemoryCache::new(1024 * 1024);
        cache.put("a", solid(10, 10));
        cache.put("a", solid(5, 5));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.size_bytes(), 5 * 5 * 4);
    }

    #[test]
    fn test_oversized_image_not_stored() {
        let cache = MemoryCache::new(16);
        cache.put("big", solid(10, 10));
        assert!(cache.is_empty());
        assert_eq!(cache.size_bytes(), 0);
    }

    #[test]
    fn test_clear() {
        let cache = MemoryCache::new(1024 * 1024);
        cache.put("a", solid(1, 1));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.size_bytes(), 0);
    }
}
