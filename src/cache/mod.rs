//! Cache module for conversion results
//!
//! Conversion results are keyed by a fingerprint of the raw input, so identical
//! inputs share an entry regardless of where they came from. Caching is either
//! disabled or backed by a single [`CacheStore`], chosen once at construction.

mod store;

use std::sync::Arc;

pub use store::{fingerprint, CacheStats, CacheStore};

use crate::config::CacheConfig;

/// Result cache owned by a converter
#[derive(Debug, Clone)]
pub enum ConversionCache {
    /// Every lookup misses and nothing is stored
    Disabled,
    /// Results are kept in the given store
    Enabled(Arc<CacheStore>),
}

impl ConversionCache {
    /// Builds the cache described by `config`
    ///
    /// When caching is enabled with a bounded retention, the periodic sweep is
    /// spawned on the current tokio runtime and runs until [`ConversionCache::stop`].
    pub fn new(config: &CacheConfig) -> Self {
        if !config.enabled {
            return ConversionCache::Disabled;
        }

        let store = Arc::new(
            CacheStore::new(config.retention).with_sweep_interval(config.sweep_interval),
        );
        store.start_sweeper();
        ConversionCache::Enabled(store)
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, ConversionCache::Enabled(_))
    }

    /// Returns the cached output for `raw`, if any
    pub fn lookup(&self, raw: &[u8]) -> Option<String> {
        match self {
            ConversionCache::Disabled => None,
            ConversionCache::Enabled(store) => store.lookup(raw),
        }
    }

    /// Caches `output` as the result for `raw`
    pub fn store(&self, raw: &[u8], output: &str) {
        if let ConversionCache::Enabled(store) = self {
            store.store(raw, output);
        }
    }

    /// Runs one eviction pass and returns the number of removed entries
    pub fn sweep(&self) -> usize {
        match self {
            ConversionCache::Disabled => 0,
            ConversionCache::Enabled(store) => store.sweep(),
        }
    }

    /// Stops the periodic sweep; idempotent
    pub fn stop(&self) {
        if let ConversionCache::Enabled(store) = self {
            store.stop();
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ConversionCache::Disabled => 0,
            ConversionCache::Enabled(store) => store.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Activity counters; all zero when disabled
    pub fn stats(&self) -> CacheStats {
        match self {
            ConversionCache::Disabled => CacheStats::default(),
            ConversionCache::Enabled(store) => store.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Retention;
    use std::time::Duration;

    #[test]
    fn test_disabled_cache_never_stores() {
        let cache = ConversionCache::new(&CacheConfig::default());

        assert!(!cache.is_enabled());
        cache.store(b"input", "out");
        assert!(cache.lookup(b"input").is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.sweep(), 0);
        assert_eq!(cache.stats(), CacheStats::default());
        cache.stop();
    }

    #[tokio::test]
    async fn test_enabled_cache_round_trip() {
        let cache = ConversionCache::new(&CacheConfig::enabled());

        assert!(cache.is_enabled());
        assert!(cache.lookup(b"input").is_none());
        cache.store(b"input", "out");
        assert_eq!(cache.lookup(b"input").as_deref(), Some("out"));
        assert_eq!(cache.len(), 1);
        cache.stop();
    }

    #[tokio::test]
    async fn test_new_schedules_sweep_only_for_bounded_retention() {
        let bounded = ConversionCache::new(&CacheConfig::enabled());
        let unbounded = ConversionCache::new(&CacheConfig {
            enabled: true,
            retention: Retention::Unbounded,
            sweep_interval: Duration::from_secs(1),
        });

        match (&bounded, &unbounded) {
            (ConversionCache::Enabled(b), ConversionCache::Enabled(u)) => {
                assert!(b.is_sweeping());
                assert!(!u.is_sweeping());
                assert_eq!(u.sweep_interval(), Duration::from_secs(1));
            }
            _ => panic!("both caches should be enabled"),
        }

        bounded.stop();
        unbounded.stop();
    }

    #[test]
    fn test_new_outside_runtime_does_not_panic() {
        let cache = ConversionCache::new(&CacheConfig::enabled());
        cache.store(b"input", "out");
        assert_eq!(cache.lookup(b"input").as_deref(), Some("out"));
        cache.stop();
    }
}
