//! Result cache keyed by request fingerprint.
//!
//! Upstream imagery and model calls take seconds to minutes and are billed
//! per call; caching completed results under the request fingerprint turns
//! repeated identical submissions into O(1) lookups. Entries expire after a
//! TTL: an expired entry behaves as a miss, is purged lazily on read, and
//! is also reclaimed by the periodic maintenance sweep. A stale value is
//! never returned.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::analysis::AnalysisResult;
use crate::fingerprint::Fingerprint;

/// Entry in the result cache.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: AnalysisResult,
    expires_at: Instant,
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that returned a live value
    pub hits: u64,
    /// Lookups that found nothing usable
    pub misses: u64,
    /// Entries removed because they expired
    pub expirations: u64,
    /// Entries currently held (live or not yet purged)
    pub entries: usize,
}

/// Concurrent TTL cache of computed analysis results.
///
/// At most one entry exists per fingerprint: a write for an existing
/// fingerprint replaces the value and extends the expiry, it never creates
/// a second entry.
pub struct ResultCache {
    entries: DashMap<Fingerprint, CacheEntry>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
}

impl ResultCache {
    /// Creates a cache whose [`store`](Self::store) uses `default_ttl`.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Looks up a live value for the fingerprint.
    ///
    /// An expired entry is removed on the spot and reported as a miss.
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<AnalysisResult> {
        let expired = match self.entries.get(fingerprint) {
            Some(entry) if entry.expires_at > Instant::now() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove(fingerprint);
            self.expirations.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Stores a value under the fingerprint with the default TTL.
    pub fn store(&self, fingerprint: Fingerprint, value: AnalysisResult) {
        self.store_with_ttl(fingerprint, value, self.default_ttl);
    }

    /// Stores a value under the fingerprint with an explicit TTL.
    ///
    /// Replaces any prior entry for the fingerprint and resets its expiry.
    pub fn store_with_ttl(&self, fingerprint: Fingerprint, value: AnalysisResult, ttl: Duration) {
        self.entries.insert(
            fingerprint,
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Removes every expired entry. Returns the number removed.
    ///
    /// Called by the maintenance sweep; lazy purging on lookup already
    /// guarantees staleness is never observable.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            self.expirations.fetch_add(purged as u64, Ordering::Relaxed);
            tracing::debug!(purged, "Purged expired cache entries");
        }
        purged
    }

    /// Returns a snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no entries are held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;
    use crate::geo::{AnalysisKind, AnalysisRequest, BoundingBox};

    fn request(kind: AnalysisKind) -> AnalysisRequest {
        AnalysisRequest {
            bbox: BoundingBox::new(2.2, 48.8, 2.4, 48.9).unwrap(),
            from_date: "2023-06-01".parse().unwrap(),
            to_date: "2024-06-01".parse().unwrap(),
            kind,
        }
    }

    fn result(change: f64) -> AnalysisResult {
        AnalysisResult {
            analysis_kind: AnalysisKind::Ndvi,
            from_date: "2023-06-01".parse().unwrap(),
            to_date: "2024-06-01".parse().unwrap(),
            from_value: Some(0.6),
            to_value: Some(0.4),
            change_percentage: Some(change),
            preview_from: None,
            preview_to: None,
            summary: None,
        }
    }

    #[test]
    fn test_lookup_miss_on_empty_cache() {
        let cache = ResultCache::new(Duration::from_secs(60));
        let fp = fingerprint(&request(AnalysisKind::Ndvi));

        assert_eq!(cache.lookup(&fp), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_store_then_hit() {
        let cache = ResultCache::new(Duration::from_secs(60));
        let fp = fingerprint(&request(AnalysisKind::Ndvi));

        cache.store(fp.clone(), result(-33.33));
        assert_eq!(cache.lookup(&fp), Some(result(-33.33)));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_store_replaces_single_entry() {
        let cache = ResultCache::new(Duration::from_secs(60));
        let fp = fingerprint(&request(AnalysisKind::Ndvi));

        cache.store(fp.clone(), result(-33.33));
        cache.store(fp.clone(), result(12.5));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup(&fp), Some(result(12.5)));
    }

    #[test]
    fn test_expired_entry_is_a_miss_and_purged() {
        let cache = ResultCache::new(Duration::from_secs(60));
        let fp = fingerprint(&request(AnalysisKind::Ndvi));

        cache.store_with_ttl(fp.clone(), result(-33.33), Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(cache.lookup(&fp), None);
        assert_eq!(cache.len(), 0, "lazy purge removes the entry");

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.expirations, 1);
    }

    #[test]
    fn test_store_extends_expiry() {
        let cache = ResultCache::new(Duration::from_secs(60));
        let fp = fingerprint(&request(AnalysisKind::Ndvi));

        cache.store_with_ttl(fp.clone(), result(-33.33), Duration::from_millis(10));
        // Rewrite before expiry with a long TTL; the entry must survive.
        cache.store_with_ttl(fp.clone(), result(-33.33), Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(cache.lookup(&fp), Some(result(-33.33)));
    }

    #[test]
    fn test_purge_expired_sweep() {
        let cache = ResultCache::new(Duration::from_secs(60));
        let live = fingerprint(&request(AnalysisKind::Ndvi));
        let dead = fingerprint(&request(AnalysisKind::Ndwi));

        cache.store(live.clone(), result(1.0));
        cache.store_with_ttl(dead, result(2.0), Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.lookup(&live).is_some());
    }

    #[test]
    fn test_distinct_fingerprints_do_not_collide() {
        let cache = ResultCache::new(Duration::from_secs(60));
        let ndvi = fingerprint(&request(AnalysisKind::Ndvi));
        let ndwi = fingerprint(&request(AnalysisKind::Ndwi));

        cache.store(ndvi.clone(), result(1.0));
        assert_eq!(cache.lookup(&ndwi), None);
        assert_eq!(cache.lookup(&ndvi), Some(result(1.0)));
    }
}
