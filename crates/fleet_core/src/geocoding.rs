//! Place search: resolving free-text addresses to coordinates.
//!
//! The lookup itself is an external service reached through [`PlaceLookup`].
//! [`CachedPlaceLookup`] wraps any implementation with an LRU cache keyed by
//! the normalised query, and [`resolve_pair`] issues the pickup and drop
//! lookups concurrently.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use h3o::LatLng;
use lru::LruCache;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("no place matched '{0}'")]
    NoResult(String),
    #[error("place search request failed: {0}")]
    Request(String),
    #[error("place search response could not be decoded: {0}")]
    Decode(String),
}

/// Address-to-coordinate resolution. The first result wins; there is no
/// disambiguation or confidence threshold.
pub trait PlaceLookup: Send + Sync {
    fn lookup_place(&self, query: &str) -> Result<LatLng, LookupError>;
}

impl<T: PlaceLookup + ?Sized> PlaceLookup for Box<T> {
    fn lookup_place(&self, query: &str) -> Result<LatLng, LookupError> {
        (**self).lookup_place(query)
    }
}

/// Resolve pickup and drop concurrently.
pub fn resolve_pair(
    lookup: &dyn PlaceLookup,
    pickup: &str,
    drop: &str,
) -> (Result<LatLng, LookupError>, Result<LatLng, LookupError>) {
    rayon::join(|| lookup.lookup_place(pickup), || lookup.lookup_place(drop))
}

/// LRU-cached wrapper around any [`PlaceLookup`]. Only successful lookups are
/// cached, so a transient failure is retried on the next call.
pub struct CachedPlaceLookup {
    inner: Box<dyn PlaceLookup>,
    cache: Mutex<LruCache<String, LatLng>>,
}

impl CachedPlaceLookup {
    pub fn new(inner: Box<dyn PlaceLookup>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }
}

impl PlaceLookup for CachedPlaceLookup {
    fn lookup_place(&self, query: &str) -> Result<LatLng, LookupError> {
        let key = normalize_query(query);
        if key.is_empty() {
            return Err(LookupError::NoResult(query.to_string()));
        }

        // Fast path: cache hit
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&key) {
                return Ok(*hit);
            }
        }

        let resolved = self.inner.lookup_place(query.trim())?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, resolved);
        }
        Ok(resolved)
    }
}

/// Case-fold and collapse whitespace so trivially different spellings of
/// the same address share a cache slot.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    struct CountingLookup {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl PlaceLookup for CountingLookup {
        fn lookup_place(&self, query: &str) -> Result<LatLng, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LookupError::Request("offline".to_string()));
            }
            let lat = query.len() as f64 / 10.0;
            LatLng::new(lat, 0.0).map_err(|err| LookupError::Decode(err.to_string()))
        }
    }

    #[test]
    fn cache_serves_repeated_queries_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let lookup = CachedPlaceLookup::new(
            Box::new(CountingLookup {
                calls: Arc::clone(&calls),
                fail: false,
            }),
            8,
        );

        let first = lookup.lookup_place("Main  Depot").expect("first");
        let second = lookup.lookup_place("main depot").expect("second");
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failures_are_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let lookup = CachedPlaceLookup::new(
            Box::new(CountingLookup {
                calls: Arc::clone(&calls),
                fail: true,
            }),
            8,
        );

        assert!(lookup.lookup_place("Depot").is_err());
        assert!(lookup.lookup_place("Depot").is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn blank_query_never_reaches_inner_lookup() {
        let calls = Arc::new(AtomicUsize::new(0));
        let lookup = CachedPlaceLookup::new(
            Box::new(CountingLookup {
                calls: Arc::clone(&calls),
                fail: false,
            }),
            8,
        );
        assert_eq!(
            lookup.lookup_place("   "),
            Err(LookupError::NoResult("   ".to_string()))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn resolve_pair_returns_both_results() {
        let calls = Arc::new(AtomicUsize::new(0));
        let lookup = CountingLookup {
            calls: Arc::clone(&calls),
            fail: false,
        };
        let (pickup, drop) = resolve_pair(&lookup, "ab", "abcd");
        assert!((pickup.expect("pickup").lat() - 0.2).abs() < 1e-9);
        assert!((drop.expect("drop").lat() - 0.4).abs() < 1e-9);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
