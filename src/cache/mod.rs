//! Result caches keyed by request fingerprint

mod memory;

pub use memory::MemoryCache;

use crate::bitmap::SharedImage;

/// Fingerprint-keyed image store.
///
/// Implementations are shared between workers and must synchronise
/// internally.
pub trait ImageCache: Send + Sync {
    fn get(&self, key: &str) -> Option<SharedImage>;

    fn put(&self, key: &str, image: SharedImage);

    /// Number of cached images.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total pixel bytes held.
    fn size_bytes(&self) -> u64;

    fn clear(&self);
}

/// Cache that never stores anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl ImageCache for NoCache {
    fn get(&self, _key: &str) -> Option<SharedImage> {
        None
    }

    fn put(&self, _key: &str, _image: SharedImage) {}

    fn len(&self) -> usize {
        0
    }

    fn size_bytes(&self) -> u64 {
        0
    }

    fn clear(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::solid;

    #[test]
    fn test_no_cache_never_stores() {
        let cache = NoCache;
        cache.put("a", solid(2, 2));
        assert!(cache.get("a").is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.size_bytes(), 0);
    }
}
