//! Memoization for expensive symbol enumerations.
//!
//! Large shared libraries can yield tens of thousands of symbols; repeated
//! extraction of the same system library dominates batch runs. The cache
//! memoizes [`extract_symbols`] results by file path for paths that look like
//! long-lived libraries, with a bounded entry count and FIFO eviction.
//!
//! [`extract_symbols`]: SymbolCache::extract_symbols

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::base::{ExtractError, ExtractErrorKind, SymbolInfo};
use crate::factory::ExtractorFactory;

/// Maximum number of cached files.
const MAX_ENTRIES: usize = 100;

/// Minimum symbol count for a result to be worth caching.
const MIN_SYMBOLS_TO_CACHE: usize = 100;

#[derive(Default)]
struct CacheInner {
    entries: HashMap<PathBuf, Vec<SymbolInfo>>,
    order: VecDeque<PathBuf>,
    hits: u64,
    misses: u64,
}

/// A bounded, thread-safe cache in front of symbol extraction.
///
/// All operations are serialized by a single mutex; callers receive copies of
/// the cached vectors, so no reference outlives the critical section.
#[derive(Default)]
pub struct SymbolCache {
    inner: Mutex<CacheInner>,
}

impl SymbolCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Extracts symbols for `path`, consulting the cache first.
    ///
    /// On a miss the factory-selected extractor runs and the result is cached
    /// when the path matches the worth-caching heuristic and the symbol count
    /// reaches the minimum.
    pub fn extract_symbols(&self, path: &Path) -> Result<Vec<SymbolInfo>, ExtractError> {
        self.extract_symbols_with(path, |path| {
            let extractor = ExtractorFactory::create_extractor(path).ok_or_else(|| {
                ExtractError::new(
                    ExtractErrorKind::NotSupported,
                    format!("no extractor accepts {}", path.display()),
                )
            })?;
            extractor.extract_symbols(path)
        })
    }

    /// Cache-through variant with an explicit extraction function.
    ///
    /// This is the seam the public method drives; it also allows tests to
    /// exercise cache behavior deterministically.
    pub fn extract_symbols_with(
        &self,
        path: &Path,
        extract: impl FnOnce(&Path) -> Result<Vec<SymbolInfo>, ExtractError>,
    ) -> Result<Vec<SymbolInfo>, ExtractError> {
        {
            let mut inner = self.inner.lock();
            if let Some(symbols) = inner.entries.get(path) {
                let symbols = symbols.clone();
                inner.hits += 1;
                return Ok(symbols);
            }
            inner.misses += 1;
        }

        // Extraction runs outside the critical section; it can take long.
        let symbols = extract(path)?;

        if should_cache(path) && symbols.len() >= MIN_SYMBOLS_TO_CACHE {
            let mut inner = self.inner.lock();
            if !inner.entries.contains_key(path) {
                while inner.entries.len() >= MAX_ENTRIES {
                    let Some(oldest) = inner.order.pop_front() else {
                        break;
                    };
                    inner.entries.remove(&oldest);
                }
                inner.entries.insert(path.to_path_buf(), symbols.clone());
                inner.order.push_back(path.to_path_buf());
            }
        }

        Ok(symbols)
    }

    /// Returns the hit and miss counters since the last [`clear_cache`].
    ///
    /// [`clear_cache`]: SymbolCache::clear_cache
    pub fn cache_stats(&self) -> (u64, u64) {
        let inner = self.inner.lock();
        (inner.hits, inner.misses)
    }

    /// The number of cached files.
    pub fn cache_size(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Drops all cached entries and resets both counters.
    pub fn clear_cache(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
        inner.hits = 0;
        inner.misses = 0;
    }
}

/// The worth-caching heuristic.
///
/// System library locations and shared objects are worth keeping; short-lived
/// build artifacts are not.
fn should_cache(path: &Path) -> bool {
    let path = path.to_string_lossy();

    if path.contains(".exe") || path.contains(".bin") {
        return false;
    }

    path.contains("/usr/lib")
        || path.contains("/lib")
        || path.contains("libc.so")
        || path.contains("libstdc++")
        || path.ends_with(".so")
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn symbols(count: usize) -> Vec<SymbolInfo> {
        (0..count)
            .map(|i| SymbolInfo {
                name: format!("sym_{i}"),
                address: i as u64,
                defined: true,
                global: true,
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_hit_after_eligible_extraction() {
        let cache = SymbolCache::new();
        let path = Path::new("/usr/lib/x86_64-linux-gnu/libc.so.6");

        let first = cache
            .extract_symbols_with(path, |_| Ok(symbols(200)))
            .unwrap();
        assert_eq!(cache.cache_stats(), (0, 1));
        assert_eq!(cache.cache_size(), 1);

        // The second call must not invoke the extraction function.
        let second = cache
            .extract_symbols_with(path, |_| panic!("must be served from cache"))
            .unwrap();
        assert_eq!(cache.cache_stats(), (1, 1));
        assert_eq!(first, second);
    }

    #[test]
    fn test_small_results_not_cached() {
        let cache = SymbolCache::new();
        let path = Path::new("/usr/lib/libtiny.so");

        cache.extract_symbols_with(path, |_| Ok(symbols(5))).unwrap();
        assert_eq!(cache.cache_size(), 0);
        cache.extract_symbols_with(path, |_| Ok(symbols(5))).unwrap();
        assert_eq!(cache.cache_stats(), (0, 2));
    }

    #[test]
    fn test_short_lived_artifacts_not_cached() {
        let cache = SymbolCache::new();

        for path in ["/build/out/tool.exe", "/build/out/firmware.bin"] {
            cache
                .extract_symbols_with(Path::new(path), |_| Ok(symbols(500)))
                .unwrap();
        }
        assert_eq!(cache.cache_size(), 0);
    }

    #[test]
    fn test_ineligible_path_not_cached() {
        let cache = SymbolCache::new();

        cache
            .extract_symbols_with(Path::new("/home/dev/scratch/a.out"), |_| Ok(symbols(500)))
            .unwrap();
        assert_eq!(cache.cache_size(), 0);
    }

    #[test]
    fn test_fifo_eviction() {
        let cache = SymbolCache::new();

        for i in 0..(MAX_ENTRIES + 10) {
            let path = PathBuf::from(format!("/usr/lib/libdummy{i}.so"));
            cache
                .extract_symbols_with(&path, |_| Ok(symbols(MIN_SYMBOLS_TO_CACHE)))
                .unwrap();
        }

        assert_eq!(cache.cache_size(), MAX_ENTRIES);

        // The oldest entries were evicted; re-querying them misses.
        let (hits, misses) = cache.cache_stats();
        assert_eq!(hits, 0);
        assert_eq!(misses, (MAX_ENTRIES + 10) as u64);

        cache
            .extract_symbols_with(Path::new("/usr/lib/libdummy0.so"), |_| {
                Ok(symbols(MIN_SYMBOLS_TO_CACHE))
            })
            .unwrap();
        let (hits, _) = cache.cache_stats();
        assert_eq!(hits, 0);
    }

    #[test]
    fn test_clear_cache_resets_stats() {
        let cache = SymbolCache::new();
        let path = Path::new("/usr/lib/libbig.so");

        cache.extract_symbols_with(path, |_| Ok(symbols(200))).unwrap();
        cache.extract_symbols_with(path, |_| Ok(symbols(200))).unwrap();
        assert_eq!(cache.cache_stats(), (1, 1));

        cache.clear_cache();
        assert_eq!(cache.cache_stats(), (0, 0));
        assert_eq!(cache.cache_size(), 0);
    }

    #[test]
    fn test_stats_account_for_every_query() {
        let cache = SymbolCache::new();
        let path = Path::new("/usr/lib/libm.so.6");

        for _ in 0..5 {
            cache.extract_symbols_with(path, |_| Ok(symbols(150))).unwrap();
        }

        let (hits, misses) = cache.cache_stats();
        assert_eq!(hits + misses, 5);
        assert_eq!(misses, 1);
    }
}
