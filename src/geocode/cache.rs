//! Bounded address cache keyed by rounded coordinates.

use lru::LruCache;
use std::num::NonZeroUsize;
use tracing::debug;

/// Coordinates rounded to a fixed number of decimal places.
///
/// Two positions that round to the same key share one cached address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoordKey {
    lat: i64,
    long: i64,
}

impl CoordKey {
    pub fn new(lat: f64, long: f64, precision: u32) -> Self {
        let scale = 10f64.powi(precision as i32);
        Self {
            lat: (lat * scale).round() as i64,
            long: (long * scale).round() as i64,
        }
    }
}

/// LRU table of successfully resolved addresses. Failures never enter it.
pub struct GeocodeCache {
    entries: LruCache<CoordKey, String>,
}

impl GeocodeCache {
    /// Create a cache holding at most `capacity` addresses (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Look up an address, marking it as most recently used
    pub fn get(&mut self, key: &CoordKey) -> Option<String> {
        self.entries.get(key).cloned()
    }

    pub fn insert(&mut self, key: CoordKey, address: String) {
        if let Some((evicted, _)) = self.entries.push(key, address) {
            if evicted != key {
                debug!("Geocode cache full, evicted {:?}", evicted);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}
