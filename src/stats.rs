//! Engine counters

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cache::ImageCache;

/// Counter sink used by hunters and the dispatcher.
///
/// [`Stats::snapshot`] is also taken when a hunt fails on resource
/// exhaustion, so the log shows what the cache held at the time.
pub trait Stats: Send + Sync {
    fn cache_hit(&self);
    fn cache_miss(&self);
    fn decoded(&self);
    fn transformed(&self);
    fn coalesced(&self);
    fn retried(&self);
    fn completed(&self);
    fn failed(&self);
    fn snapshot(&self) -> StatsSnapshot;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub decodes: u64,
    pub transforms: u64,
    pub coalesced: u64,
    pub retries: u64,
    pub completed: u64,
    pub failures: u64,
    pub cache_entries: usize,
    pub cache_bytes: u64,
}

/// Atomic counters plus the engine's memory cache occupancy
pub struct EngineStats {
    cache: Arc<dyn ImageCache>,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    decodes: AtomicU64,
    transforms: AtomicU64,
    coalesced: AtomicU64,
    retries: AtomicU64,
    completed: AtomicU64,
    failures: AtomicU64,
}

impl EngineStats {
    pub fn new(cache: Arc<dyn ImageCache>) -> Self {
        Self {
            cache,
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            decodes: AtomicU64::new(0),
            transforms: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    fn bump(counter: &AtomicU64, name: &'static str) {
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = name, "Metric incremented");
    }
}

impl Stats for EngineStats {
    fn cache_hit(&self) {
        Self::bump(&self.cache_hits, "cache_hits");
    }

    fn cache_miss(&self) {
        Self::bump(&self.cache_misses, "cache_misses");
    }

    fn decoded(&self) {
        Self::bump(&self.decodes, "decodes");
    }

    fn transformed(&self) {
        Self::bump(&self.transforms, "transforms");
    }

    fn coalesced(&self) {
        Self::bump(&self.coalesced, "coalesced");
    }

    fn retried(&self) {
        Self::bump(&self.retries, "retries");
    }

    fn completed(&self) {
        Self::bump(&self.completed, "completed");
    }

    fn failed(&self) {
        Self::bump(&self.failures, "failures");
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            decodes: self.decodes.load(Ordering::Relaxed),
            transforms: self.transforms.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            cache_entries: self.cache.len(),
            cache_bytes: self.cache.size_bytes(),
        }
    }
}
